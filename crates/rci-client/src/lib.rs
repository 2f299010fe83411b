//! 客户端接口模块
//!
//! 本 crate 提供监督端（客户端）使用的接口，包括：
//! - 每个命令一个强类型方法，返回该命令自己的状态枚举
//! - 单槽在途标记（同一时刻至多一条命令）
//! - 本地会话镜像，交换未完成时标记结果未知
//! - TOML 配置
//!
//! # 使用场景
//!
//! 这是大多数用户应该使用的模块。命令的非成功状态（`Rejected`、`InvalidType` 等）
//! 不是错误，调用方必须检查返回的状态。
//!
//! ```no_run
//! use rci_client::{ClientConfig, Robot};
//! use rci_driver::{ControllerBuilder, ServerLoopback};
//! use rci_protocol::{ControllerMode, StartControllerStatus};
//!
//! # fn main() -> Result<(), rci_client::ClientError> {
//! let (server, _events) = ControllerBuilder::new().build();
//! let robot = Robot::new(ServerLoopback::new(server), ClientConfig::default());
//! robot.connect()?;
//! if robot.start_controller(ControllerMode::JointImpedance)? != StartControllerStatus::Success {
//!     eprintln!("controller already running");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
mod error;
pub mod mirror;
mod robot;

pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use mirror::{MotionNotification, RobotSession};
pub use robot::Robot;
