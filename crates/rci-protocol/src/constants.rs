//! 协议常量定义

use crate::ids::ProtocolVersion;

/// 当前协议版本
///
/// 连接握手时客户端与控制器必须精确相等，不做任何前向/后向兼容。
pub const PROTOCOL_VERSION: ProtocolVersion = 1;

/// 命令通道的固定端口
pub const COMMAND_PORT: u16 = 1337;

/// 请求帧头长度（FunctionId: u32）
pub const REQUEST_HEADER_LEN: usize = 4;

/// 响应帧头长度（FunctionId: u32 + Status: u32）
pub const RESPONSE_HEADER_LEN: usize = 8;

/// 机械臂关节数
pub const JOINT_COUNT: usize = 7;

/// 笛卡尔空间自由度
pub const CARTESIAN_DOF: usize = 6;

/// 齐次变换矩阵元素个数（4x4，列主序）
pub const TRANSFORM_LEN: usize = 16;
