//! 控制器侧驱动模块
//!
//! 本 crate 实现命令协议的控制器一侧：
//! - 版本协商（只接受完全相等的版本）
//! - 会话状态机（控制器轴 × 运动生成器轴，外加故障标志）
//! - 单写者会话句柄（`parking_lot::Mutex` 串行写入，`ArcSwap` 无锁读取）
//! - 命令服务端（解帧 → 裁决 → 编码响应）
//! - 进程内回环传输
//!
//! # 使用场景
//!
//! 仿真控制器、集成测试，或作为真实控制器命令处理的参考实现。
//! 客户端应使用 `rci-client`。

mod builder;
mod error;
pub mod loopback;
pub mod machine;
pub mod negotiate;
mod server;
mod session;
pub mod state;

pub use builder::ControllerBuilder;
pub use error::DriverError;
pub use loopback::{LoopbackControl, ServerLoopback};
pub use machine::{CommandStep, SessionInput, Step};
pub use negotiate::{IncompatibleVersion, Negotiation, negotiate};
pub use server::{CommandServer, ServerReply};
pub use session::{Applied, ControllerSession, Executed};
pub use state::*;
