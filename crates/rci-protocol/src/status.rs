//! 命令状态码定义
//!
//! 每个命令都有自己的封闭状态枚举，底层表示为 `u32`。
//! 全协议统一约束：
//!
//! - 每个状态枚举必须包含值为 0 的 `Success` 变体
//! - 0 只能表示成功，其它变体不得取 0
//!
//! 这两条约束由 [`check_status_table`] 在编译期检查：状态枚举由
//! `command_status!` 宏生成，宏展开时会对状态表求值一个 `const` 断言，
//! 违反约束的定义无法通过编译。
//!
//! ```compile_fail
//! // 成功变体不为 0：编译期拒绝
//! const _: () = rci_protocol::status::check_status_table(&[(1, "Success"), (0, "Rejected")]);
//! ```
//!
//! ```compile_fail
//! // 缺少成功变体：编译期拒绝
//! const _: () = rci_protocol::status::check_status_table(&[(1, "Rejected")]);
//! ```
//!
//! ```
//! const _: () = rci_protocol::status::check_status_table(&[(0, "Success"), (1, "Rejected")]);
//! ```

use crate::ProtocolError;
use crate::ids::FunctionId;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// 命令状态枚举的统一接口
///
/// 通过 `command_status!` 宏实现，不建议手写实现。
pub trait CommandStatus:
    Copy + Eq + fmt::Debug + Into<u32> + TryFrom<u32> + Send + Sync + 'static
{
    /// 状态所属的命令
    const FUNCTION: FunctionId;

    /// 成功变体（线上取值恒为 0）
    const SUCCESS: Self;

    /// 状态表：`(线上取值, 变体名)`
    const TABLE: &'static [(u32, &'static str)];

    /// 线上取值
    fn code(self) -> u32 {
        self.into()
    }

    /// 是否为成功
    fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    /// 从线上取值解析，未知取值返回 `InvalidStatus`
    fn from_code(code: u32) -> Result<Self, ProtocolError> {
        Self::try_from(code).map_err(|_| ProtocolError::InvalidStatus {
            function: Self::FUNCTION,
            value: code,
        })
    }

    /// 变体名
    fn name(self) -> &'static str {
        let code = self.code();
        Self::TABLE
            .iter()
            .find(|(value, _)| *value == code)
            .map(|(_, name)| *name)
            .unwrap_or("Unknown")
    }
}

/// 编译期检查状态表
///
/// 要求：恰有一个名为 `Success` 的条目且取值为 0，所有取值互不相同。
/// 在 `const` 上下文中调用时，违反约束会导致编译失败。
pub const fn check_status_table(table: &[(u32, &str)]) {
    let mut success_count = 0;
    let mut i = 0;
    while i < table.len() {
        let (value, name) = table[i];
        if str_eq(name, "Success") {
            assert!(value == 0, "Success status must be encoded as 0");
            success_count += 1;
        } else {
            assert!(value != 0, "status value 0 is reserved for Success");
        }
        let mut j = i + 1;
        while j < table.len() {
            assert!(table[j].0 != value, "duplicate status value");
            j += 1;
        }
        i += 1;
    }
    assert!(success_count == 1, "status table must define exactly one Success variant");
}

const fn str_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

macro_rules! command_status {
    (
        $(#[$meta:meta])*
        $name:ident => $function:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr(u32)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value, )+
        }

        impl CommandStatus for $name {
            const FUNCTION: FunctionId = FunctionId::$function;
            const SUCCESS: Self = Self::Success;
            const TABLE: &'static [(u32, &'static str)] = &[$(($value, stringify!($variant))),+];
        }

        const _: () = check_status_table(<$name as CommandStatus>::TABLE);
    };
}

command_status! {
    /// 连接命令状态
    ConnectStatus => Connect {
        Success = 0,
        /// 客户端与控制器的协议版本不一致
        IncompatibleLibraryVersion = 1,
        /// 会话已连接
        Rejected = 2,
    }
}

command_status! {
    /// 启动运动生成器的状态
    ///
    /// 除同步返回的 `Success`/`InvalidType`/`Rejected` 外，一次激活的结束
    /// 通过 `Finished`（计划内完成）或 `Aborted`（安全违规/外部中止）异步通知。
    StartMotionGeneratorStatus => StartMotionGenerator {
        Success = 0,
        /// 未知的运动生成器模式
        InvalidType = 1,
        Finished = 2,
        Aborted = 3,
        /// 启动时合法性检查失败，运动轴保持 Idle
        Rejected = 4,
    }
}

command_status! {
    /// 停止运动生成器的状态（幂等，总是成功）
    StopMotionGeneratorStatus => StopMotionGenerator {
        Success = 0,
    }
}

command_status! {
    /// 启动控制器的状态
    StartControllerStatus => StartController {
        Success = 0,
        Rejected = 1,
    }
}

command_status! {
    /// 停止控制器的状态（幂等，总是成功）
    StopControllerStatus => StopController {
        Success = 0,
    }
}

command_status! {
    /// 查询笛卡尔限位的状态
    GetCartesianLimitStatus => GetCartesianLimit {
        Success = 0,
        /// 请求已接收，结果尚未就绪
        Received = 1,
        Rejected = 2,
    }
}

command_status! {
    SetControllerModeStatus => SetControllerMode {
        Success = 0,
        Rejected = 1,
    }
}

command_status! {
    SetCollisionBehaviorStatus => SetCollisionBehavior {
        Success = 0,
        Rejected = 1,
    }
}

command_status! {
    SetJointImpedanceStatus => SetJointImpedance {
        Success = 0,
        Rejected = 1,
    }
}

command_status! {
    SetCartesianImpedanceStatus => SetCartesianImpedance {
        Success = 0,
        Rejected = 1,
    }
}

command_status! {
    SetGuidingModeStatus => SetGuidingMode {
        Success = 0,
        Rejected = 1,
    }
}

command_status! {
    SetEEToKStatus => SetEEToK {
        Success = 0,
        Rejected = 1,
    }
}

command_status! {
    SetFToEEStatus => SetFToEE {
        Success = 0,
        Rejected = 1,
    }
}

command_status! {
    SetLoadStatus => SetLoad {
        Success = 0,
        Rejected = 1,
    }
}

command_status! {
    SetTimeScalingFactorStatus => SetTimeScalingFactor {
        Success = 0,
        Rejected = 1,
    }
}

command_status! {
    /// 自动错误恢复的状态（未处于故障时为空操作成功）
    AutomaticErrorRecoveryStatus => AutomaticErrorRecovery {
        Success = 0,
    }
}

command_status! {
    ResetExternalTorqueAndForceMaxStatus => ResetExternalTorqueAndForceMax {
        Success = 0,
        Rejected = 1,
    }
}
