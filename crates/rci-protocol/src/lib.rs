//! # RCI Protocol
//!
//! 机器人控制器命令/响应协议定义（无 IO 依赖）
//!
//! ## 模块
//!
//! - `ids`: 功能 ID 定义
//! - `constants`: 协议常量定义
//! - `status`: 各命令的状态枚举（0 恒为成功）
//! - `control`: 请求负载与请求和类型
//! - `feedback`: 响应负载与响应和类型
//! - `codec`: 线上编解码
//! - `registry`: 编译期命令注册表
//! - `safety`: 安全违规词汇表与故障分类
//!
//! ## 字节序
//!
//! 协议所有多字节整数和浮点数均使用小端字节序，与主机无关。

pub mod codec;
pub mod constants;
pub mod control;
pub mod feedback;
pub mod ids;
pub mod registry;
pub mod safety;
pub mod status;

// 重新导出常用类型
pub use codec::{
    WirePayload, decode_request, decode_request_as, decode_response, encode_request,
    encode_response, peek_function,
};
pub use constants::*;
pub use control::*;
pub use feedback::*;
pub use ids::*;
pub use registry::{CommandSchema, REGISTRY, schema};
pub use safety::{RawSafetyFlags, SafetyViolation, SafetyViolationSet, classify};
pub use status::*;

use thiserror::Error;

/// 协议编解码错误类型（帧错误）
///
/// 这类错误总是终止当前交换，且不会修改会话状态。
/// 与命令状态码是不同的类别：状态码表示命令被正确传达后的结果。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Unknown function id: {id}")]
    UnknownFunction { id: u32 },

    #[error("Function mismatch: expected {expected}, got {actual}")]
    FunctionMismatch {
        expected: FunctionId,
        actual: FunctionId,
    },

    #[error("Invalid status {value} for {function}")]
    InvalidStatus { function: FunctionId, value: u32 },

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: &'static str, value: u32 },

    #[error("Non-zero padding in {function} payload")]
    InvalidPadding { function: FunctionId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::InvalidLength {
            expected: 12,
            actual: 4,
        };
        assert_eq!(err.to_string(), "Invalid frame length: expected 12, got 4");

        let err = ProtocolError::FunctionMismatch {
            expected: FunctionId::StartController,
            actual: FunctionId::StopController,
        };
        assert_eq!(
            err.to_string(),
            "Function mismatch: expected StartController, got StopController"
        );

        let err = ProtocolError::InvalidStatus {
            function: FunctionId::SetLoad,
            value: 9,
        };
        assert!(err.to_string().contains("SetLoad"));
    }
}
