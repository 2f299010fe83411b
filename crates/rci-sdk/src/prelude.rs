//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use rci_sdk::prelude::*;
//! ```

pub use rci_client::{ClientConfig, ClientError, MotionNotification, Robot, RobotSession};
pub use rci_driver::{
    AxisState, CommandServer, ControllerBuilder, ControllerSession, MotionEvent, ServerLoopback,
    SessionState,
};
pub use rci_protocol::{
    CommandStatus, ControllerMode, FunctionId, FunctionSet, MotionGeneratorMode, ProtocolError,
    Request, Response, SafetyViolation, SafetyViolationSet,
};
pub use rci_transport::{CommandTransport, TransportError};
