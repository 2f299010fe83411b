//! 进程内回环传输
//!
//! 把客户端发出的请求帧直接交给 [`CommandServer`] 处理，并把响应帧和
//! 运动结束通知帧排队给客户端接收。用于集成测试和仿真，不涉及套接字。

use crate::server::CommandServer;
use crate::state::MotionEvent;
use bytes::Bytes;
use crossbeam_channel::Receiver;
use rci_transport::{CommandTransport, TransportError, hex_dump};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// 回环的外部控制句柄
#[derive(Debug, Clone, Default)]
pub struct LoopbackControl {
    drop_replies: Arc<AtomicUsize>,
}

impl LoopbackControl {
    /// 丢弃下一条响应
    ///
    /// 服务端照常处理请求（会话状态会改变），但客户端收不到响应，
    /// 用于模拟"未收到响应"。
    pub fn drop_next_reply(&self) {
        self.drop_replies.fetch_add(1, Ordering::SeqCst);
    }

    fn take_drop(&self) -> bool {
        self.drop_replies
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// 进程内命令通道
pub struct ServerLoopback {
    server: CommandServer,
    notifications: Receiver<MotionEvent>,
    inbox: VecDeque<Bytes>,
    control: LoopbackControl,
    /// 服务端要求在最后一条响应后关闭
    closing: bool,
    closed: bool,
}

impl ServerLoopback {
    /// 通知订阅容量
    const NOTIFICATION_CAPACITY: usize = 64;

    pub fn new(server: CommandServer) -> Self {
        let notifications = server.session().subscribe(Self::NOTIFICATION_CAPACITY);
        Self {
            server,
            notifications,
            inbox: VecDeque::new(),
            control: LoopbackControl::default(),
            closing: false,
            closed: false,
        }
    }

    pub fn control(&self) -> LoopbackControl {
        self.control.clone()
    }

    pub fn server(&self) -> &CommandServer {
        &self.server
    }

    fn drain_notifications(&mut self) {
        for event in self.notifications.try_iter() {
            self.inbox.push_back(CommandServer::notification_frame(&event));
        }
    }
}

impl CommandTransport for ServerLoopback {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if self.closed || self.closing {
            return Err(TransportError::Closed);
        }

        // 已发生的通知排在本次响应之前
        self.drain_notifications();
        match self.server.handle_frame(frame) {
            Ok(reply) => {
                self.closing = reply.close;
                if self.control.take_drop() {
                    debug!(frame = %hex_dump(&reply.frame), "loopback dropped reply");
                } else {
                    self.inbox.push_back(reply.frame);
                }
            },
            Err(err) => {
                // 帧错误：本次交换终止，没有响应
                warn!(%err, "controller dropped request");
            },
        }
        Ok(())
    }

    fn receive_timeout(&mut self, _timeout: Duration) -> Result<Bytes, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.drain_notifications();
        match self.inbox.pop_front() {
            Some(frame) => Ok(frame),
            None if self.closing => {
                self.closed = true;
                Err(TransportError::Closed)
            },
            None => Err(TransportError::Timeout),
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.server.session().disconnect() {
            warn!(%err, "disconnect failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ControllerBuilder;
    use rci_protocol::*;

    fn connect(transport: &mut ServerLoopback) {
        transport
            .send(&encode_request(&Request::Connect(ConnectRequest::new(1338))))
            .unwrap();
        let frame = transport.receive_timeout(Duration::ZERO).unwrap();
        assert!(decode_response(&frame, FunctionId::Connect).unwrap().is_success());
    }

    #[test]
    fn test_drop_next_reply() {
        let (server, _events) = ControllerBuilder::new().build();
        let mut transport = ServerLoopback::new(server);
        connect(&mut transport);

        transport.control().drop_next_reply();
        transport
            .send(&encode_request(&Request::StartController(StartControllerRequest {
                mode: ControllerMode::JointImpedance,
            })))
            .unwrap();
        assert!(matches!(
            transport.receive_timeout(Duration::ZERO),
            Err(TransportError::Timeout)
        ));
        // 服务端已执行
        assert!(transport.server().session().state().controller.is_active());
    }

    #[test]
    fn test_notifications_are_framed() {
        let (server, _events) = ControllerBuilder::new().build();
        let mut transport = ServerLoopback::new(server);
        connect(&mut transport);

        transport
            .send(&encode_request(&Request::StartMotionGenerator(
                StartMotionGeneratorRequest {
                    mode: MotionGeneratorMode::JointPosition,
                },
            )))
            .unwrap();
        transport.receive_timeout(Duration::ZERO).unwrap();

        transport.server().session().finish_motion().unwrap();
        let frame = transport.receive_timeout(Duration::ZERO).unwrap();
        assert_eq!(
            decode_response(&frame, FunctionId::StartMotionGenerator).unwrap(),
            Response::StartMotionGenerator(StartMotionGeneratorStatus::Finished)
        );
    }

    #[test]
    fn test_version_mismatch_closes_after_reply() {
        let (server, _events) = ControllerBuilder::new().protocol_version(2).build();
        let mut transport = ServerLoopback::new(server);
        transport
            .send(&encode_request(&Request::Connect(ConnectRequest::with_version(1, 1338))))
            .unwrap();
        assert!(transport.receive_timeout(Duration::ZERO).is_ok());
        assert!(matches!(
            transport.receive_timeout(Duration::ZERO),
            Err(TransportError::Closed)
        ));
        assert!(matches!(transport.send(&[0, 0, 0, 0]), Err(TransportError::Closed)));
    }

    #[test]
    fn test_close_destroys_session() {
        let (server, _events) = ControllerBuilder::new().build();
        let mut transport = ServerLoopback::new(server);
        connect(&mut transport);
        transport.close();
        assert!(!transport.server().session().state().is_connected());
    }
}
