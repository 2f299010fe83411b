//! 会话状态定义
//!
//! 会话状态由控制器轴、运动生成器轴、故障标志和锁存的违规集合组成。
//! 两条轴相互独立，各自是 Idle / Starting / Active 三态。

use rci_protocol::{
    CartesianLimit, ControllerMode, MotionGeneratorMode, ProtocolVersion, SafetyViolationSet,
    SetCollisionBehaviorRequest, SetGuidingModeRequest, SetLoadRequest,
    StartMotionGeneratorStatus, CARTESIAN_DOF, JOINT_COUNT, TRANSFORM_LEN,
};

// ============================================================================
// 连接阶段
// ============================================================================

/// 连接阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    Connected,
}

// ============================================================================
// 轴状态
// ============================================================================

/// 单条轴（控制器或运动生成器）的状态
///
/// 同一时刻每条轴至多一个模式处于活动状态。
///
/// 控制器在一次转换内完成启动（Idle → Active），会话状态中不会出现
/// `Starting`；它只出现在客户端镜像里，表示启动请求已发出、响应未到。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisState<M> {
    Idle,
    /// 启动请求已发出，尚未收到响应
    Starting(M),
    Active(M),
}

impl<M> Default for AxisState<M> {
    fn default() -> Self {
        AxisState::Idle
    }
}

impl<M: Copy> AxisState<M> {
    pub fn is_idle(&self) -> bool {
        matches!(self, AxisState::Idle)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, AxisState::Active(_))
    }

    /// 活动模式（仅 Active）
    pub fn active_mode(&self) -> Option<M> {
        match self {
            AxisState::Active(mode) => Some(*mode),
            _ => None,
        }
    }

    /// 当前模式（Starting 或 Active）
    pub fn mode(&self) -> Option<M> {
        match self {
            AxisState::Idle => None,
            AxisState::Starting(mode) | AxisState::Active(mode) => Some(*mode),
        }
    }

    /// 启动：Idle → Active
    ///
    /// 非 Idle 时返回 `None`，调用方据此回复拒绝。
    pub fn activate(self, mode: M) -> Option<Self> {
        match self {
            AxisState::Idle => Some(AxisState::Active(mode)),
            _ => None,
        }
    }

    /// 开始启动：Idle → Starting
    ///
    /// 非 Idle 时返回 `None`，调用方据此回复拒绝。
    pub fn begin_start(self, mode: M) -> Option<Self> {
        match self {
            AxisState::Idle => Some(AxisState::Starting(mode)),
            _ => None,
        }
    }

    /// 结束启动：Starting → Active（接受）或 Idle（拒绝）
    ///
    /// 其他状态原样返回。
    pub fn finish_start(self, accepted: bool) -> Self {
        match self {
            AxisState::Starting(mode) if accepted => AxisState::Active(mode),
            AxisState::Starting(_) => AxisState::Idle,
            other => other,
        }
    }

    /// 停止：任意状态 → Idle，返回之前的模式
    pub fn stop(self) -> (Self, Option<M>) {
        (AxisState::Idle, self.mode())
    }
}

// ============================================================================
// 控制参数
// ============================================================================

/// 配置命令写入的控制参数
///
/// 供（外部）实时控制回路读取；未设置的项为 `None`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlParameters {
    /// 当前控制律（`StartController` / `SetControllerMode` 写入）
    pub controller_mode: ControllerMode,
    pub collision_behavior: Option<SetCollisionBehaviorRequest>,
    pub joint_impedance: Option<[f64; JOINT_COUNT]>,
    pub cartesian_impedance: Option<[f64; CARTESIAN_DOF]>,
    pub guiding_mode: Option<SetGuidingModeRequest>,
    /// 末端到 K 坐标系的变换（列主序）
    pub ee_t_k: Option<[f64; TRANSFORM_LEN]>,
    /// 法兰到末端的变换（列主序）
    pub f_t_ee: Option<[f64; TRANSFORM_LEN]>,
    pub load: Option<SetLoadRequest>,
    pub time_scaling_factor: f64,
    /// 外部力矩/力最大值被重置的次数
    pub external_max_resets: u32,
    /// `GetCartesianLimit` 返回的限位
    pub cartesian_limit: CartesianLimit,
}

impl Default for ControlParameters {
    fn default() -> Self {
        Self {
            controller_mode: ControllerMode::default(),
            collision_behavior: None,
            joint_impedance: None,
            cartesian_impedance: None,
            guiding_mode: None,
            ee_t_k: None,
            f_t_ee: None,
            load: None,
            time_scaling_factor: 1.0,
            external_max_resets: 0,
            cartesian_limit: CartesianLimit::default(),
        }
    }
}

// ============================================================================
// 会话状态
// ============================================================================

/// 每个连接一份的会话状态
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionState {
    pub phase: ConnectionPhase,
    /// 协商后的协议版本
    pub version: Option<ProtocolVersion>,
    /// 客户端指定的实时状态 UDP 端口
    pub udp_port: Option<u16>,
    pub controller: AxisState<ControllerMode>,
    pub motion: AxisState<MotionGeneratorMode>,
    /// 会话级故障标志，只能由 `AutomaticErrorRecovery` 清除
    pub faulted: bool,
    /// 锁存的安全违规
    pub latched: SafetyViolationSet,
    pub parameters: ControlParameters,
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        self.phase == ConnectionPhase::Connected
    }

    /// 清空会话数据，保留控制器固有的笛卡尔限位
    pub fn cleared(&self) -> Self {
        let mut next = Self::default();
        next.parameters.cartesian_limit = self.parameters.cartesian_limit;
        next
    }
}

// ============================================================================
// 运动结束通知
// ============================================================================

/// 一次运动生成器激活的终止通知
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionEvent {
    /// 计划完成（或被 `StopMotionGenerator` 结束）
    Finished { mode: MotionGeneratorMode },
    /// 安全违规或外部触发的中止
    ///
    /// 每次进入故障都会发出；故障时没有活动运动则 `mode` 为 `None`。
    Aborted {
        mode: Option<MotionGeneratorMode>,
        violations: SafetyViolationSet,
    },
}

impl MotionEvent {
    pub fn mode(&self) -> Option<MotionGeneratorMode> {
        match self {
            MotionEvent::Finished { mode } => Some(*mode),
            MotionEvent::Aborted { mode, .. } => *mode,
        }
    }

    /// 该通知在命令通道上对应的 `StartMotionGenerator` 状态
    pub fn status(&self) -> StartMotionGeneratorStatus {
        match self {
            MotionEvent::Finished { .. } => StartMotionGeneratorStatus::Finished,
            MotionEvent::Aborted { .. } => StartMotionGeneratorStatus::Aborted,
        }
    }
}
