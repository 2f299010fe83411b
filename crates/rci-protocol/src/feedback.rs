//! 响应结构体定义
//!
//! 响应帧由 `[FunctionId][Status][可选固定负载]` 组成。
//! 只有 `Connect`（版本号）和 `GetCartesianLimit`（限位结果）带负载。

use crate::codec::{WirePayload, get_bool, get_f64_array, put_bool, put_f64_array};
use crate::constants::{PROTOCOL_VERSION, TRANSFORM_LEN};
use crate::ids::{FunctionId, ProtocolVersion};
use crate::status::*;
use crate::ProtocolError;
use bytes::{Buf, BufMut, BytesMut};

/// 连接响应
///
/// 负载只有控制器的协议版本（2 字节），状态在帧头中。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectResponse {
    pub status: ConnectStatus,
    pub version: ProtocolVersion,
}

impl ConnectResponse {
    /// 连接响应负载长度
    pub const PAYLOAD_LEN: usize = 2;

    /// 使用当前协议版本创建响应
    pub fn new(status: ConnectStatus) -> Self {
        Self {
            status,
            version: PROTOCOL_VERSION,
        }
    }
}

/// 笛卡尔限位查询结果
///
/// 布局（184 字节）：
///
/// ```text
/// ┌──────────────┬──────────────┬────────────────┬────────────┬──────────┐
/// │ p_min 3×f64  │ p_max 3×f64  │ frame 16×f64   │ active u8  │ pad 7×u8 │
/// └──────────────┴──────────────┴────────────────┴────────────┴──────────┘
/// ```
///
/// 末尾布尔值补齐到 8 字节对齐，填充字节必须为 0。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CartesianLimit {
    pub object_p_min: [f64; 3],
    pub object_p_max: [f64; 3],
    pub object_frame: [f64; TRANSFORM_LEN],
    pub object_activation: bool,
}

impl CartesianLimit {
    const PADDING: usize = 7;
}

impl WirePayload for CartesianLimit {
    const WIRE_LEN: usize = (3 + 3 + TRANSFORM_LEN) * 8 + 1 + Self::PADDING;

    fn write_to(&self, buf: &mut BytesMut) {
        put_f64_array(buf, &self.object_p_min);
        put_f64_array(buf, &self.object_p_max);
        put_f64_array(buf, &self.object_frame);
        put_bool(buf, self.object_activation);
        buf.put_bytes(0, Self::PADDING);
    }

    fn read_from(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        let limit = Self {
            object_p_min: get_f64_array(buf),
            object_p_max: get_f64_array(buf),
            object_frame: get_f64_array(buf),
            object_activation: get_bool(buf, "object_activation")?,
        };
        if (*buf)[..Self::PADDING].iter().any(|b| *b != 0) {
            return Err(ProtocolError::InvalidPadding {
                function: FunctionId::GetCartesianLimit,
            });
        }
        buf.advance(Self::PADDING);
        Ok(limit)
    }
}

/// 笛卡尔限位查询响应
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GetCartesianLimitResponse {
    pub status: GetCartesianLimitStatus,
    pub limit: CartesianLimit,
}

/// 命令响应
///
/// 变体与 [`Request`](crate::Request) 一一对应，功能 ID 总是与请求相同。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Response {
    Connect(ConnectResponse),
    StartMotionGenerator(StartMotionGeneratorStatus),
    StopMotionGenerator(StopMotionGeneratorStatus),
    StartController(StartControllerStatus),
    StopController(StopControllerStatus),
    GetCartesianLimit(GetCartesianLimitResponse),
    SetControllerMode(SetControllerModeStatus),
    SetCollisionBehavior(SetCollisionBehaviorStatus),
    SetJointImpedance(SetJointImpedanceStatus),
    SetCartesianImpedance(SetCartesianImpedanceStatus),
    SetGuidingMode(SetGuidingModeStatus),
    SetEEToK(SetEEToKStatus),
    SetFToEE(SetFToEEStatus),
    SetLoad(SetLoadStatus),
    SetTimeScalingFactor(SetTimeScalingFactorStatus),
    AutomaticErrorRecovery(AutomaticErrorRecoveryStatus),
    ResetExternalTorqueAndForceMax(ResetExternalTorqueAndForceMaxStatus),
}

impl Response {
    /// 响应对应的功能 ID
    pub fn function_id(&self) -> FunctionId {
        match self {
            Response::Connect(_) => FunctionId::Connect,
            Response::StartMotionGenerator(_) => FunctionId::StartMotionGenerator,
            Response::StopMotionGenerator(_) => FunctionId::StopMotionGenerator,
            Response::StartController(_) => FunctionId::StartController,
            Response::StopController(_) => FunctionId::StopController,
            Response::GetCartesianLimit(_) => FunctionId::GetCartesianLimit,
            Response::SetControllerMode(_) => FunctionId::SetControllerMode,
            Response::SetCollisionBehavior(_) => FunctionId::SetCollisionBehavior,
            Response::SetJointImpedance(_) => FunctionId::SetJointImpedance,
            Response::SetCartesianImpedance(_) => FunctionId::SetCartesianImpedance,
            Response::SetGuidingMode(_) => FunctionId::SetGuidingMode,
            Response::SetEEToK(_) => FunctionId::SetEEToK,
            Response::SetFToEE(_) => FunctionId::SetFToEE,
            Response::SetLoad(_) => FunctionId::SetLoad,
            Response::SetTimeScalingFactor(_) => FunctionId::SetTimeScalingFactor,
            Response::AutomaticErrorRecovery(_) => FunctionId::AutomaticErrorRecovery,
            Response::ResetExternalTorqueAndForceMax(_) => {
                FunctionId::ResetExternalTorqueAndForceMax
            },
        }
    }

    /// 状态的线上取值
    pub fn status_code(&self) -> u32 {
        match self {
            Response::Connect(r) => r.status.code(),
            Response::StartMotionGenerator(s) => s.code(),
            Response::StopMotionGenerator(s) => s.code(),
            Response::StartController(s) => s.code(),
            Response::StopController(s) => s.code(),
            Response::GetCartesianLimit(r) => r.status.code(),
            Response::SetControllerMode(s) => s.code(),
            Response::SetCollisionBehavior(s) => s.code(),
            Response::SetJointImpedance(s) => s.code(),
            Response::SetCartesianImpedance(s) => s.code(),
            Response::SetGuidingMode(s) => s.code(),
            Response::SetEEToK(s) => s.code(),
            Response::SetFToEE(s) => s.code(),
            Response::SetLoad(s) => s.code(),
            Response::SetTimeScalingFactor(s) => s.code(),
            Response::AutomaticErrorRecovery(s) => s.code(),
            Response::ResetExternalTorqueAndForceMax(s) => s.code(),
        }
    }

    /// 状态名（用于日志）
    pub fn status_name(&self) -> &'static str {
        crate::registry::schema(self.function_id())
            .status_name(self.status_code())
            .unwrap_or("Unknown")
    }

    /// 是否成功（状态为 0）
    pub fn is_success(&self) -> bool {
        self.status_code() == 0
    }

    /// 写入状态之后的负载
    pub(crate) fn write_payload(&self, buf: &mut BytesMut) {
        match self {
            Response::Connect(r) => buf.put_u16_le(r.version),
            Response::GetCartesianLimit(r) => r.limit.write_to(buf),
            _ => {},
        }
    }

    /// 由功能 ID、状态取值和负载构建响应
    ///
    /// 调用方需保证 `payload` 长度已与功能 ID 的固定长度校验一致。
    pub(crate) fn read_parts(
        function: FunctionId,
        code: u32,
        payload: &mut &[u8],
    ) -> Result<Self, ProtocolError> {
        Ok(match function {
            FunctionId::Connect => Response::Connect(ConnectResponse {
                status: ConnectStatus::from_code(code)?,
                version: payload.get_u16_le(),
            }),
            FunctionId::StartMotionGenerator => {
                Response::StartMotionGenerator(StartMotionGeneratorStatus::from_code(code)?)
            },
            FunctionId::StopMotionGenerator => {
                Response::StopMotionGenerator(StopMotionGeneratorStatus::from_code(code)?)
            },
            FunctionId::StartController => {
                Response::StartController(StartControllerStatus::from_code(code)?)
            },
            FunctionId::StopController => {
                Response::StopController(StopControllerStatus::from_code(code)?)
            },
            FunctionId::GetCartesianLimit => {
                let status = GetCartesianLimitStatus::from_code(code)?;
                Response::GetCartesianLimit(GetCartesianLimitResponse {
                    status,
                    limit: CartesianLimit::read_from(payload)?,
                })
            },
            FunctionId::SetControllerMode => {
                Response::SetControllerMode(SetControllerModeStatus::from_code(code)?)
            },
            FunctionId::SetCollisionBehavior => {
                Response::SetCollisionBehavior(SetCollisionBehaviorStatus::from_code(code)?)
            },
            FunctionId::SetJointImpedance => {
                Response::SetJointImpedance(SetJointImpedanceStatus::from_code(code)?)
            },
            FunctionId::SetCartesianImpedance => {
                Response::SetCartesianImpedance(SetCartesianImpedanceStatus::from_code(code)?)
            },
            FunctionId::SetGuidingMode => {
                Response::SetGuidingMode(SetGuidingModeStatus::from_code(code)?)
            },
            FunctionId::SetEEToK => Response::SetEEToK(SetEEToKStatus::from_code(code)?),
            FunctionId::SetFToEE => Response::SetFToEE(SetFToEEStatus::from_code(code)?),
            FunctionId::SetLoad => Response::SetLoad(SetLoadStatus::from_code(code)?),
            FunctionId::SetTimeScalingFactor => {
                Response::SetTimeScalingFactor(SetTimeScalingFactorStatus::from_code(code)?)
            },
            FunctionId::AutomaticErrorRecovery => {
                Response::AutomaticErrorRecovery(AutomaticErrorRecoveryStatus::from_code(code)?)
            },
            FunctionId::ResetExternalTorqueAndForceMax => Response::ResetExternalTorqueAndForceMax(
                ResetExternalTorqueAndForceMaxStatus::from_code(code)?,
            ),
        })
    }
}
