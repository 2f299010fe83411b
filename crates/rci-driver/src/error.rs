//! 驱动层错误类型定义

use rci_protocol::{FunctionId, ProtocolError};
use rci_transport::TransportError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输层错误
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 协议解析错误（帧错误）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 会话尚未建立
    ///
    /// 连接成功之前，除 `Connect` 之外的任何命令都没有会话可以作用。
    #[error("Session not connected, cannot handle {function}")]
    NotConnected { function: FunctionId },
}

#[cfg(test)]
mod tests {
    use super::DriverError;
    use rci_protocol::{FunctionId, ProtocolError};
    use rci_transport::TransportError;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::from(TransportError::Closed);
        assert_eq!(format!("{}", err), "Transport error: Connection closed");

        let err = DriverError::from(ProtocolError::InvalidLength {
            expected: 8,
            actual: 4,
        });
        assert!(err.to_string().contains("Invalid frame length"));

        let err = DriverError::NotConnected {
            function: FunctionId::StartController,
        };
        assert_eq!(
            err.to_string(),
            "Session not connected, cannot handle StartController"
        );
    }
}
