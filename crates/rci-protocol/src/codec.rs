//! 线上编解码
//!
//! 帧格式：
//!
//! ```text
//! 请求：┌────────────────┬──────────────────────────┐
//!       │ FunctionId u32 │ 固定长度负载              │
//!       └────────────────┴──────────────────────────┘
//! 响应：┌────────────────┬────────────┬──────────────┐
//!       │ FunctionId u32 │ Status u32 │ 固定长度负载 │
//!       └────────────────┴────────────┴──────────────┘
//! ```
//!
//! 全协议统一使用小端字节序，与主机字节序无关。负载长度由功能 ID 唯一确定
//! （见 [`registry`](crate::registry)），长度不符的帧直接拒绝。

use crate::constants::{REQUEST_HEADER_LEN, RESPONSE_HEADER_LEN};
use crate::control::*;
use crate::feedback::Response;
use crate::ids::FunctionId;
use crate::registry::schema;
use crate::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

/// 固定布局负载
///
/// 实现者保证 `write_to` 恰好写入 `WIRE_LEN` 字节；
/// `read_from` 调用前，调用方已确认缓冲区至少有 `WIRE_LEN` 字节。
pub trait WirePayload: Sized {
    /// 负载字节数
    const WIRE_LEN: usize;

    /// 编码到缓冲区
    fn write_to(&self, buf: &mut BytesMut);

    /// 从缓冲区解码并前移游标
    fn read_from(buf: &mut &[u8]) -> Result<Self, ProtocolError>;
}

impl WirePayload for () {
    const WIRE_LEN: usize = 0;

    fn write_to(&self, _buf: &mut BytesMut) {}

    fn read_from(_buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(())
    }
}

pub(crate) fn put_f64_array<const N: usize>(buf: &mut BytesMut, values: &[f64; N]) {
    for value in values {
        buf.put_f64_le(*value);
    }
}

pub(crate) fn get_f64_array<const N: usize>(buf: &mut &[u8]) -> [f64; N] {
    let mut values = [0.0; N];
    for value in values.iter_mut() {
        *value = buf.get_f64_le();
    }
    values
}

pub(crate) fn put_bool(buf: &mut BytesMut, value: bool) {
    buf.put_u8(u8::from(value));
}

pub(crate) fn get_bool(buf: &mut &[u8], field: &'static str) -> Result<bool, ProtocolError> {
    match buf.get_u8() {
        0 => Ok(false),
        1 => Ok(true),
        value => Err(ProtocolError::InvalidValue {
            field,
            value: u32::from(value),
        }),
    }
}

/// 读取帧头中的功能 ID（不校验负载）
pub fn peek_function(frame: &[u8]) -> Result<FunctionId, ProtocolError> {
    if frame.len() < REQUEST_HEADER_LEN {
        return Err(ProtocolError::InvalidLength {
            expected: REQUEST_HEADER_LEN,
            actual: frame.len(),
        });
    }
    let mut header = &frame[..REQUEST_HEADER_LEN];
    let id = header.get_u32_le();
    FunctionId::try_from(id).map_err(|_| ProtocolError::UnknownFunction { id })
}

// ============================================================================
// 请求
// ============================================================================

/// 编码请求帧
pub fn encode_request(request: &Request) -> Bytes {
    let function = request.function_id();
    let mut buf = BytesMut::with_capacity(schema(function).request_frame_len());
    buf.put_u32_le(function.as_u32());
    match request {
        Request::Connect(req) => req.write_to(&mut buf),
        Request::StartMotionGenerator(req) => req.write_to(&mut buf),
        Request::StartController(req) => req.write_to(&mut buf),
        Request::SetControllerMode(req) => req.write_to(&mut buf),
        Request::SetCollisionBehavior(req) => req.write_to(&mut buf),
        Request::SetJointImpedance(req) => req.write_to(&mut buf),
        Request::SetCartesianImpedance(req) => req.write_to(&mut buf),
        Request::SetGuidingMode(req) => req.write_to(&mut buf),
        Request::SetEEToK(req) => req.write_to(&mut buf),
        Request::SetFToEE(req) => req.write_to(&mut buf),
        Request::SetLoad(req) => req.write_to(&mut buf),
        Request::SetTimeScalingFactor(req) => req.write_to(&mut buf),
        Request::StopMotionGenerator
        | Request::StopController
        | Request::GetCartesianLimit
        | Request::AutomaticErrorRecovery
        | Request::ResetExternalTorqueAndForceMax => {},
    }
    trace!(?function, len = buf.len(), "encoded request");
    buf.freeze()
}

/// 解码请求帧（功能 ID 取自帧头）
pub fn decode_request(frame: &[u8]) -> Result<Request, ProtocolError> {
    let function = peek_function(frame)?;
    let expected = schema(function).request_frame_len();
    if frame.len() != expected {
        return Err(ProtocolError::InvalidLength {
            expected,
            actual: frame.len(),
        });
    }

    let mut payload = &frame[REQUEST_HEADER_LEN..];
    let request = match function {
        FunctionId::Connect => Request::Connect(ConnectRequest::read_from(&mut payload)?),
        FunctionId::StartMotionGenerator => {
            Request::StartMotionGenerator(StartMotionGeneratorRequest::read_from(&mut payload)?)
        },
        FunctionId::StopMotionGenerator => Request::StopMotionGenerator,
        FunctionId::StartController => {
            Request::StartController(StartControllerRequest::read_from(&mut payload)?)
        },
        FunctionId::StopController => Request::StopController,
        FunctionId::GetCartesianLimit => Request::GetCartesianLimit,
        FunctionId::SetControllerMode => {
            Request::SetControllerMode(SetControllerModeRequest::read_from(&mut payload)?)
        },
        FunctionId::SetCollisionBehavior => {
            Request::SetCollisionBehavior(SetCollisionBehaviorRequest::read_from(&mut payload)?)
        },
        FunctionId::SetJointImpedance => {
            Request::SetJointImpedance(SetJointImpedanceRequest::read_from(&mut payload)?)
        },
        FunctionId::SetCartesianImpedance => Request::SetCartesianImpedance(
            SetCartesianImpedanceRequest::read_from(&mut payload)?,
        ),
        FunctionId::SetGuidingMode => {
            Request::SetGuidingMode(SetGuidingModeRequest::read_from(&mut payload)?)
        },
        FunctionId::SetEEToK => Request::SetEEToK(SetEEToKRequest::read_from(&mut payload)?),
        FunctionId::SetFToEE => Request::SetFToEE(SetFToEERequest::read_from(&mut payload)?),
        FunctionId::SetLoad => Request::SetLoad(SetLoadRequest::read_from(&mut payload)?),
        FunctionId::SetTimeScalingFactor => {
            Request::SetTimeScalingFactor(SetTimeScalingFactorRequest::read_from(&mut payload)?)
        },
        FunctionId::AutomaticErrorRecovery => Request::AutomaticErrorRecovery,
        FunctionId::ResetExternalTorqueAndForceMax => Request::ResetExternalTorqueAndForceMax,
    };
    debug_assert!(payload.is_empty());
    Ok(request)
}

/// 按指定功能 ID 解码请求帧
///
/// 帧头功能 ID 与 `expected` 不一致时返回 `FunctionMismatch`。
pub fn decode_request_as(frame: &[u8], expected: FunctionId) -> Result<Request, ProtocolError> {
    let actual = peek_function(frame)?;
    if actual != expected {
        return Err(ProtocolError::FunctionMismatch { expected, actual });
    }
    decode_request(frame)
}

// ============================================================================
// 响应
// ============================================================================

/// 编码响应帧
pub fn encode_response(response: &Response) -> Bytes {
    let function = response.function_id();
    let mut buf = BytesMut::with_capacity(schema(function).response_frame_len());
    buf.put_u32_le(function.as_u32());
    buf.put_u32_le(response.status_code());
    response.write_payload(&mut buf);
    trace!(?function, status = response.status_code(), len = buf.len(), "encoded response");
    buf.freeze()
}

/// 解码响应帧
///
/// 响应必须回显发出请求的功能 ID，否则视为帧错误（`FunctionMismatch`）。
pub fn decode_response(frame: &[u8], expected: FunctionId) -> Result<Response, ProtocolError> {
    let function = peek_function(frame)?;
    if function != expected {
        return Err(ProtocolError::FunctionMismatch {
            expected,
            actual: function,
        });
    }
    let expected_len = schema(function).response_frame_len();
    if frame.len() != expected_len {
        return Err(ProtocolError::InvalidLength {
            expected: expected_len,
            actual: frame.len(),
        });
    }

    let mut body = &frame[REQUEST_HEADER_LEN..];
    let code = body.get_u32_le();
    debug_assert_eq!(frame.len() - body.len(), RESPONSE_HEADER_LEN);
    Response::read_parts(function, code, &mut body)
}
