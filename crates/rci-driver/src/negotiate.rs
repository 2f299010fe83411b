//! 版本协商
//!
//! 只接受完全相等的版本号，没有向前/向后兼容逻辑：
//! 实时控制通道上任何版本偏差都视为不安全。

use rci_protocol::ProtocolVersion;
use thiserror::Error;
use tracing::{debug, warn};

/// 版本不兼容
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("incompatible protocol version: client {client}, server {server}")]
pub struct IncompatibleVersion {
    pub client: ProtocolVersion,
    pub server: ProtocolVersion,
}

/// 协商结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiation {
    /// 版本一致，会话可以建立
    Accepted(ProtocolVersion),
    /// 版本不一致，连接应当关闭
    Rejected(IncompatibleVersion),
}

impl Negotiation {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Negotiation::Accepted(_))
    }

    pub fn into_result(self) -> Result<ProtocolVersion, IncompatibleVersion> {
        match self {
            Negotiation::Accepted(version) => Ok(version),
            Negotiation::Rejected(err) => Err(err),
        }
    }
}

/// 协商客户端与控制器的协议版本
pub fn negotiate(client: ProtocolVersion, server: ProtocolVersion) -> Negotiation {
    if client == server {
        debug!(version = client, "protocol version accepted");
        Negotiation::Accepted(client)
    } else {
        warn!(client, server, "protocol version mismatch");
        Negotiation::Rejected(IncompatibleVersion { client, server })
    }
}
