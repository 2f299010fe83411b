//! 命令注册表
//!
//! 编译期确定的 17 项映射：功能 ID → 请求负载长度、响应负载长度、状态表。
//! 注册表在常量求值时构建，构建过程中：
//!
//! - 每个状态表经过 [`check_status_table`] 检查（0 只能是 `Success`）
//! - 条目顺序必须与功能 ID 的取值一致
//!
//! 任一检查失败都会导致编译失败，不存在运行时注册。

use crate::constants::{REQUEST_HEADER_LEN, RESPONSE_HEADER_LEN};
use crate::codec::WirePayload;
use crate::control::*;
use crate::feedback::{CartesianLimit, ConnectResponse};
use crate::ids::FunctionId;
use crate::status::*;

/// 单个命令的线上模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSchema {
    pub function: FunctionId,
    /// 请求负载长度（不含 4 字节功能 ID）
    pub request_len: usize,
    /// 响应负载长度（不含 4 字节功能 ID 和 4 字节状态）
    pub response_len: usize,
    /// 状态表：`(线上取值, 变体名)`
    pub statuses: &'static [(u32, &'static str)],
}

impl CommandSchema {
    const fn of<S: CommandStatus>(request_len: usize, response_len: usize) -> Self {
        check_status_table(S::TABLE);
        Self {
            function: S::FUNCTION,
            request_len,
            response_len,
            statuses: S::TABLE,
        }
    }

    /// 请求帧总长度
    pub const fn request_frame_len(&self) -> usize {
        REQUEST_HEADER_LEN + self.request_len
    }

    /// 响应帧总长度
    pub const fn response_frame_len(&self) -> usize {
        RESPONSE_HEADER_LEN + self.response_len
    }

    /// 查询状态名
    pub fn status_name(&self, code: u32) -> Option<&'static str> {
        self.statuses
            .iter()
            .find(|(value, _)| *value == code)
            .map(|(_, name)| *name)
    }

    /// 状态取值是否属于该命令
    pub fn is_valid_status(&self, code: u32) -> bool {
        self.status_name(code).is_some()
    }
}

/// 注册表（按功能 ID 取值排列）
pub const REGISTRY: [CommandSchema; FunctionId::COUNT] = [
    CommandSchema::of::<ConnectStatus>(ConnectRequest::WIRE_LEN, ConnectResponse::PAYLOAD_LEN),
    CommandSchema::of::<StartMotionGeneratorStatus>(StartMotionGeneratorRequest::WIRE_LEN, 0),
    CommandSchema::of::<StopMotionGeneratorStatus>(0, 0),
    CommandSchema::of::<StartControllerStatus>(StartControllerRequest::WIRE_LEN, 0),
    CommandSchema::of::<StopControllerStatus>(0, 0),
    CommandSchema::of::<GetCartesianLimitStatus>(0, CartesianLimit::WIRE_LEN),
    CommandSchema::of::<SetControllerModeStatus>(SetControllerModeRequest::WIRE_LEN, 0),
    CommandSchema::of::<SetCollisionBehaviorStatus>(SetCollisionBehaviorRequest::WIRE_LEN, 0),
    CommandSchema::of::<SetJointImpedanceStatus>(SetJointImpedanceRequest::WIRE_LEN, 0),
    CommandSchema::of::<SetCartesianImpedanceStatus>(SetCartesianImpedanceRequest::WIRE_LEN, 0),
    CommandSchema::of::<SetGuidingModeStatus>(SetGuidingModeRequest::WIRE_LEN, 0),
    CommandSchema::of::<SetEEToKStatus>(SetEEToKRequest::WIRE_LEN, 0),
    CommandSchema::of::<SetFToEEStatus>(SetFToEERequest::WIRE_LEN, 0),
    CommandSchema::of::<SetLoadStatus>(SetLoadRequest::WIRE_LEN, 0),
    CommandSchema::of::<SetTimeScalingFactorStatus>(SetTimeScalingFactorRequest::WIRE_LEN, 0),
    CommandSchema::of::<AutomaticErrorRecoveryStatus>(0, 0),
    CommandSchema::of::<ResetExternalTorqueAndForceMaxStatus>(0, 0),
];

const fn check_registry_order(registry: &[CommandSchema]) {
    let mut i = 0;
    while i < registry.len() {
        assert!(
            registry[i].function as u32 == i as u32,
            "registry entries must be ordered by function id"
        );
        i += 1;
    }
}

const _: () = check_registry_order(&REGISTRY);

static TABLE: [CommandSchema; FunctionId::COUNT] = REGISTRY;

/// 查询命令模式
pub fn schema(function: FunctionId) -> &'static CommandSchema {
    &TABLE[function.as_u32() as usize]
}
