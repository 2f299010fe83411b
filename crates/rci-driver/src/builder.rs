//! Builder 模式实现
//!
//! 提供链式构造控制器侧 [`CommandServer`] 的便捷方式。

use crate::server::CommandServer;
use crate::session::ControllerSession;
use crate::state::{MotionEvent, SessionState};
use crossbeam_channel::Receiver;
use rci_protocol::{CartesianLimit, PROTOCOL_VERSION, ProtocolVersion};
use std::sync::Arc;
use tracing::debug;

/// 默认通知通道容量
const DEFAULT_EVENT_CAPACITY: usize = 16;

/// Controller Builder（链式构造）
///
/// # Example
///
/// ```
/// use rci_driver::ControllerBuilder;
///
/// let (server, events) = ControllerBuilder::new()
///     .protocol_version(1)
///     .event_capacity(32)
///     .build();
/// assert!(!server.session().state().is_connected());
/// assert!(events.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct ControllerBuilder {
    /// 控制器支持的协议版本
    protocol_version: ProtocolVersion,
    /// 运动结束通知通道容量
    event_capacity: usize,
    /// 控制器固有的笛卡尔限位
    cartesian_limit: CartesianLimit,
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerBuilder {
    pub fn new() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            cartesian_limit: CartesianLimit::default(),
        }
    }

    /// 设置协议版本（可选，默认 [`PROTOCOL_VERSION`]）
    pub fn protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.protocol_version = version;
        self
    }

    /// 设置通知通道容量（可选，默认 16，最小 1）
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// 设置 `GetCartesianLimit` 返回的限位
    pub fn cartesian_limit(mut self, limit: CartesianLimit) -> Self {
        self.cartesian_limit = limit;
        self
    }

    /// 构建命令服务端和运动结束通知接收端
    pub fn build(self) -> (CommandServer, Receiver<MotionEvent>) {
        let mut state = SessionState::default();
        state.parameters.cartesian_limit = self.cartesian_limit;

        let session = Arc::new(ControllerSession::with_state(self.protocol_version, state));
        let events = session.subscribe(self.event_capacity);
        debug!(
            version = self.protocol_version,
            capacity = self.event_capacity,
            "controller built"
        );
        (CommandServer::new(session), events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let (server, _events) = ControllerBuilder::default().build();
        assert_eq!(server.session().server_version(), PROTOCOL_VERSION);
        assert_eq!(server.session().state(), SessionState::default());
    }

    #[test]
    fn test_builder_cartesian_limit() {
        let limit = CartesianLimit {
            object_p_min: [-0.5, -0.5, 0.0],
            object_p_max: [0.5, 0.5, 1.0],
            object_activation: true,
            ..CartesianLimit::default()
        };
        let (server, _events) = ControllerBuilder::new()
            .protocol_version(3)
            .cartesian_limit(limit)
            .build();
        assert_eq!(server.session().server_version(), 3);
        assert_eq!(server.session().state().parameters.cartesian_limit, limit);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (_server, events) = ControllerBuilder::new().event_capacity(0).build();
        assert_eq!(events.capacity(), Some(1));
    }
}
