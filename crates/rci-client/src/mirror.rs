//! 客户端会话镜像
//!
//! 客户端根据自己发出的请求和收到的响应维护一份控制器会话的本地副本。
//! 交换未完成（超时、帧错误）时，控制器侧结果未知，镜像把该命令记入
//! 未知集合；集合中的每条命令各自保留，直到后续交换重新确定其状态：
//!
//! - 同一命令再次成功
//! - 对应的 `Stop*` 成功（运动生成器 / 控制器）
//! - 从故障中恢复成功（两条轴都回到 Idle）

use rci_driver::{AxisState, ConnectionPhase, SessionState};
use rci_protocol::*;
use tracing::{debug, warn};

/// 客户端视角的会话
///
/// 客户端无法得知实时通道上的具体违规，`state.latched` 始终为空；
/// 中止通知只置位 `state.faulted`。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RobotSession {
    pub state: SessionState,
    /// 结果未知的命令
    pub outcome_unknown: FunctionSet,
}

/// 运动结束通知
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionNotification {
    /// 结束的运动模式（镜像中没有活动运动时为 `None`）
    pub mode: Option<MotionGeneratorMode>,
    /// `Finished` 或 `Aborted`
    pub status: StartMotionGeneratorStatus,
}

impl MotionNotification {
    pub fn is_aborted(&self) -> bool {
        self.status == StartMotionGeneratorStatus::Aborted
    }
}

impl RobotSession {
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn is_outcome_unknown(&self) -> bool {
        !self.outcome_unknown.is_empty()
    }

    /// 请求发出前：启动类命令把对应轴置为 Starting
    pub(crate) fn begin(&mut self, request: &Request) {
        match *request {
            Request::StartMotionGenerator(req) => {
                if let Some(starting) = self.state.motion.begin_start(req.mode) {
                    self.state.motion = starting;
                }
            },
            Request::StartController(req) => {
                if let Some(starting) = self.state.controller.begin_start(req.mode) {
                    self.state.controller = starting;
                }
            },
            _ => {},
        }
    }

    /// 收到匹配的响应
    pub(crate) fn complete(&mut self, request: &Request, response: &Response) {
        let success = response.is_success();
        let was_faulted = self.state.faulted;

        match (*request, *response) {
            (Request::Connect(req), Response::Connect(resp)) => {
                if resp.status == ConnectStatus::Success {
                    self.state = SessionState {
                        phase: ConnectionPhase::Connected,
                        version: Some(resp.version),
                        udp_port: Some(req.udp_port),
                        ..SessionState::default()
                    };
                }
            },
            (Request::StartMotionGenerator(req), _) => {
                self.state.motion = settle(self.state.motion, req.mode, success);
            },
            (Request::StopMotionGenerator, _) => self.state.motion = AxisState::Idle,
            (Request::StartController(req), _) => {
                self.state.controller = settle(self.state.controller, req.mode, success);
                if success {
                    self.state.parameters.controller_mode = req.mode;
                }
            },
            (Request::StopController, _) => self.state.controller = AxisState::Idle,
            (Request::GetCartesianLimit, Response::GetCartesianLimit(resp)) if success => {
                self.state.parameters.cartesian_limit = resp.limit;
            },
            (Request::SetControllerMode(req), _) if success => {
                if self.state.controller.is_active() {
                    self.state.controller = AxisState::Active(req.mode);
                }
                self.state.parameters.controller_mode = req.mode;
            },
            (Request::AutomaticErrorRecovery, _) => {
                if was_faulted {
                    self.state.faulted = false;
                    self.state.latched = SafetyViolationSet::empty();
                    self.state.controller = AxisState::Idle;
                    self.state.motion = AxisState::Idle;
                }
            },
            (request, _) if success => self.configure(request),
            (_, response) if rejected_by_fault(&response) => {
                // 参数已在本地校验，拒绝只可能来自故障
                warn!(function = %request.function_id(), "configuration rejected, controller faulted");
                self.state.faulted = true;
                self.state.motion = AxisState::Idle;
            },
            _ => {},
        }

        let by = request.function_id();
        self.outcome_unknown.retain(|lost| {
            let resolved = resolves(lost, by, success, was_faulted);
            if resolved {
                debug!(%lost, %by, "outcome re-established");
            }
            !resolved
        });
    }

    fn configure(&mut self, request: Request) {
        let p = &mut self.state.parameters;
        match request {
            Request::SetCollisionBehavior(req) => p.collision_behavior = Some(req),
            Request::SetJointImpedance(req) => p.joint_impedance = Some(req.k_theta),
            Request::SetCartesianImpedance(req) => p.cartesian_impedance = Some(req.k_x),
            Request::SetGuidingMode(req) => p.guiding_mode = Some(req),
            Request::SetEEToK(req) => p.ee_t_k = Some(req.ee_t_k),
            Request::SetFToEE(req) => p.f_t_ee = Some(req.f_t_ee),
            Request::SetLoad(req) => p.load = Some(req),
            Request::SetTimeScalingFactor(req) => p.time_scaling_factor = req.factor,
            Request::ResetExternalTorqueAndForceMax => {
                p.external_max_resets = p.external_max_resets.saturating_add(1)
            },
            _ => {},
        }
    }

    /// 交换未完成
    pub(crate) fn lost(&mut self, function: FunctionId) {
        warn!(%function, "command outcome unknown");
        self.outcome_unknown.insert(function);
    }

    /// 收到运动结束通知，返回通知内容
    pub(crate) fn notify(&mut self, status: StartMotionGeneratorStatus) -> MotionNotification {
        let mode = self.state.motion.mode();
        self.state.motion = AxisState::Idle;
        if status == StartMotionGeneratorStatus::Aborted {
            warn!(?mode, "motion aborted by controller");
            self.state.faulted = true;
        }
        MotionNotification { mode, status }
    }

    /// 连接关闭
    pub(crate) fn reset(&mut self) {
        *self = RobotSession::default();
    }
}

/// 启动命令的响应：镜像中发出的 Starting 由 `finish_start` 收口
fn settle<M: Copy + PartialEq>(axis: AxisState<M>, mode: M, success: bool) -> AxisState<M> {
    match axis {
        AxisState::Starting(pending) if pending == mode => axis.finish_start(success),
        _ if success => AxisState::Active(mode),
        other => other,
    }
}

/// 配置类命令的 `Rejected`
fn rejected_by_fault(response: &Response) -> bool {
    matches!(
        response,
        Response::GetCartesianLimit(GetCartesianLimitResponse {
            status: GetCartesianLimitStatus::Rejected,
            ..
        }) | Response::SetControllerMode(SetControllerModeStatus::Rejected)
            | Response::SetCollisionBehavior(SetCollisionBehaviorStatus::Rejected)
            | Response::SetJointImpedance(SetJointImpedanceStatus::Rejected)
            | Response::SetCartesianImpedance(SetCartesianImpedanceStatus::Rejected)
            | Response::SetGuidingMode(SetGuidingModeStatus::Rejected)
            | Response::SetEEToK(SetEEToKStatus::Rejected)
            | Response::SetFToEE(SetFToEEStatus::Rejected)
            | Response::SetLoad(SetLoadStatus::Rejected)
            | Response::SetTimeScalingFactor(SetTimeScalingFactorStatus::Rejected)
            | Response::ResetExternalTorqueAndForceMax(ResetExternalTorqueAndForceMaxStatus::Rejected)
    )
}

/// `request` 的成功是否重新确定了 `lost` 的结果
fn resolves(lost: FunctionId, request: FunctionId, success: bool, was_faulted: bool) -> bool {
    use FunctionId::*;

    if !success {
        return false;
    }
    match (lost, request) {
        (lost, request) if lost == request => true,
        (StartMotionGenerator, StopMotionGenerator) => true,
        (StartController | SetControllerMode, StopController) => true,
        (_, AutomaticErrorRecovery) => was_faulted,
        _ => false,
    }
}
