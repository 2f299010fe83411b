//! 客户端错误类型

use crate::config::ConfigError;
use rci_driver::IncompatibleVersion;
use rci_protocol::{FunctionId, ParameterError, ProtocolError, ProtocolVersion};
use rci_transport::TransportError;
use thiserror::Error;

/// 客户端错误类型
///
/// 命令被拒绝、中止等结果不是错误，而是命令状态；这里只有三类：
/// 帧错误、版本协商失败，以及交换本身没有完成。
#[derive(Debug, Error)]
pub enum ClientError {
    // ==================== 交换未完成 ====================
    /// 传输层错误
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 帧错误（长度不符、功能 ID 不匹配等）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 超时未收到响应，控制器侧结果未知
    #[error("No response received for {function}")]
    NoResponse { function: FunctionId },

    /// 已有一条命令在途
    #[error("Command {outstanding} is still in flight")]
    Busy { outstanding: FunctionId },

    // ==================== 会话 ====================
    /// 版本协商失败，连接已关闭
    #[error("Incompatible protocol version: client {client}, server {server}")]
    IncompatibleVersion {
        client: ProtocolVersion,
        server: ProtocolVersion,
    },

    /// 尚未连接
    #[error("Not connected")]
    NotConnected,

    // ==================== 本地校验 ====================
    /// 参数未通过本地校验，命令没有发送
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] ParameterError),

    /// 配置加载失败
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<IncompatibleVersion> for ClientError {
    fn from(err: IncompatibleVersion) -> Self {
        ClientError::IncompatibleVersion {
            client: err.client,
            server: err.server,
        }
    }
}

impl ClientError {
    /// 控制器侧状态是否可能已与本地镜像不一致
    ///
    /// 此时调用方不能假设最后一条命令生效与否。
    pub fn is_outcome_unknown(&self) -> bool {
        matches!(
            self,
            ClientError::NoResponse { .. } | ClientError::Protocol(_) | ClientError::Transport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::NoResponse {
            function: FunctionId::StartController,
        };
        assert_eq!(err.to_string(), "No response received for StartController");
        assert!(err.is_outcome_unknown());

        let err = ClientError::from(IncompatibleVersion {
            client: 1,
            server: 2,
        });
        assert_eq!(
            err.to_string(),
            "Incompatible protocol version: client 1, server 2"
        );
        assert!(!err.is_outcome_unknown());

        let err = ClientError::Busy {
            outstanding: FunctionId::SetLoad,
        };
        assert!(err.to_string().contains("SetLoad"));
    }
}
