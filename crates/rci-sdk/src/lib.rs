//! RCI SDK - 机器人控制器命令协议 Rust SDK
//!
//! 监督端通过可靠的命令通道驱动实时机器人控制器：协商会话、启停运动生成器
//! 和控制器、配置安全限值和阻抗参数、从故障中恢复。
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`protocol`): 功能 ID、状态枚举、负载布局、编解码、命令注册表、安全违规分类
//! - **传输层** (`transport`): 命令通道抽象
//! - **驱动层** (`driver`): 版本协商、会话状态机、控制器侧命令服务端
//! - **客户端层** (`client`): 强类型命令接口和本地会话镜像
//!
//! # 快速开始
//!
//! ```rust
//! use rci_sdk::prelude::*;
//!
//! # fn main() -> Result<(), ClientError> {
//! let (server, _events) = ControllerBuilder::new().build();
//! let robot = Robot::with_defaults(ServerLoopback::new(server));
//!
//! robot.connect()?;
//! let status = robot.start_controller(ControllerMode::JointImpedance)?;
//! assert!(status.is_success());
//! # Ok(())
//! # }
//! ```

pub use rci_client as client;
pub use rci_driver as driver;
pub use rci_protocol as protocol;
pub use rci_transport as transport;

mod logging;
pub mod prelude;

pub use logging::{DEFAULT_LOG_DIRECTIVE, init_logging, init_logging_with};

// 各层错误
pub use rci_client::ClientError;
pub use rci_driver::DriverError;
pub use rci_protocol::ProtocolError;
pub use rci_transport::TransportError;

// 客户端层（推荐入口）
pub use rci_client::{ClientConfig, Robot};
