//! 命令服务端
//!
//! 把命令通道上的一帧请求变成一帧响应：解帧、经会话状态机裁决、编码回复。

use crate::error::DriverError;
use crate::session::ControllerSession;
use crate::state::MotionEvent;
use bytes::Bytes;
use rci_protocol::*;
use rci_transport::hex_dump;
use std::sync::Arc;
use tracing::{debug, warn};

/// 对一帧请求的处理结果
#[derive(Debug, Clone, PartialEq)]
pub struct ServerReply {
    /// 响应帧
    pub frame: Bytes,
    /// 发送响应后关闭连接（版本不一致）
    pub close: bool,
}

/// 命令服务端
#[derive(Clone)]
pub struct CommandServer {
    session: Arc<ControllerSession>,
}

impl CommandServer {
    pub fn new(session: Arc<ControllerSession>) -> Self {
        Self { session }
    }

    /// 会话句柄（供实时回路注入故障等）
    pub fn session(&self) -> &Arc<ControllerSession> {
        &self.session
    }

    /// 处理一帧请求
    ///
    /// 帧错误（未知功能 ID、长度不符）返回 `Err`，当前交换终止且会话不变。
    /// 长度正确但字段取值非法时，回复该命令的拒绝状态：
    /// 运动生成器模式非法为 `InvalidType`，其他为 `Rejected`。
    pub fn handle_frame(&self, frame: &[u8]) -> Result<ServerReply, DriverError> {
        let function = peek_function(frame).inspect_err(|err| {
            warn!(frame = %hex_dump(frame), %err, "malformed request");
        })?;

        let request = match decode_request_as(frame, function) {
            Ok(request) => request,
            Err(ProtocolError::InvalidValue { field, value }) => {
                return self.reject_invalid_field(function, field, value);
            },
            Err(err) => {
                warn!(%function, frame = %hex_dump(frame), %err, "malformed request");
                return Err(err.into());
            },
        };

        debug!(%function, "request");
        let executed = self.session.execute(request)?;
        debug!(%function, status = executed.response.status_name(), "response");

        Ok(ServerReply {
            frame: encode_response(&executed.response),
            close: executed.close,
        })
    }

    fn reject_invalid_field(
        &self,
        function: FunctionId,
        field: &'static str,
        value: u32,
    ) -> Result<ServerReply, DriverError> {
        if function != FunctionId::Connect && !self.session.state().is_connected() {
            return Err(DriverError::NotConnected { function });
        }

        let response = match function {
            FunctionId::StartMotionGenerator => {
                Response::StartMotionGenerator(StartMotionGeneratorStatus::InvalidType)
            },
            FunctionId::StartController => {
                Response::StartController(StartControllerStatus::Rejected)
            },
            FunctionId::SetControllerMode => {
                Response::SetControllerMode(SetControllerModeStatus::Rejected)
            },
            FunctionId::SetGuidingMode => Response::SetGuidingMode(SetGuidingModeStatus::Rejected),
            _ => return Err(ProtocolError::InvalidValue { field, value }.into()),
        };
        warn!(%function, field, value, status = response.status_name(), "invalid field value");

        Ok(ServerReply {
            frame: encode_response(&response),
            close: false,
        })
    }

    /// 运动结束通知在命令通道上的帧
    ///
    /// 以 `StartMotionGenerator` 响应的形式异步送达，状态为 `Finished` 或 `Aborted`。
    pub fn notification_frame(event: &MotionEvent) -> Bytes {
        encode_response(&Response::StartMotionGenerator(event.status()))
    }
}
