//! # RCI Transport Layer
//!
//! 命令通道的传输抽象。
//!
//! 命令通道是可靠、有序的字节流（通常为 TCP 1337 端口），
//! 每次只承载一次请求/响应交换。
//! 套接字、重传等真实 IO 不在本层实现，由上层注入实现了
//! [`CommandTransport`] 的类型。

use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "mock")]
pub use mock::MockTransport;

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    /// 在超时时间内未收到响应
    #[error("Receive timeout")]
    Timeout,
    /// 对端已关闭连接
    #[error("Connection closed")]
    Closed,
}

impl TransportError {
    /// 是否为超时（交换结果未知，而非连接失效）
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }
}

/// 命令通道
///
/// 一帧即一条完整的请求或响应（`[FunctionId][payload]` /
/// `[FunctionId][Status][payload]`），分帧由实现负责。
pub trait CommandTransport {
    /// 发送一帧
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// 接收一帧，超时返回 [`TransportError::Timeout`]
    fn receive_timeout(&mut self, timeout: Duration) -> Result<Bytes, TransportError>;

    /// 非阻塞接收
    fn try_receive(&mut self) -> Result<Option<Bytes>, TransportError> {
        match self.receive_timeout(Duration::ZERO) {
            Ok(frame) => Ok(Some(frame)),
            Err(TransportError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 关闭连接
    fn close(&mut self) {}
}

impl<T: CommandTransport + ?Sized> CommandTransport for Box<T> {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        (**self).send(frame)
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<Bytes, TransportError> {
        (**self).receive_timeout(timeout)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// 帧的十六进制摘要（用于日志）
pub fn hex_dump(frame: &[u8]) -> String {
    const MAX: usize = 32;
    if frame.len() <= MAX {
        hex::encode(frame)
    } else {
        format!("{}..(+{} bytes)", hex::encode(&frame[..MAX]), frame.len() - MAX)
    }
}
