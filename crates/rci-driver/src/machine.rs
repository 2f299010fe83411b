//! 会话状态机
//!
//! 纯函数：给定当前状态和一个输入，计算下一个状态、要回复的响应
//! 以及可能产生的运动结束通知。不做 IO，也不持有锁；
//! 串行化由 [`ControllerSession`](crate::ControllerSession) 负责。
//!
//! 非法的状态转换通过命令状态（`Rejected`）同步报告，
//! 从不作为协议错误，连接保持可用。只有连接时的版本不一致会关闭连接。

use crate::error::DriverError;
use crate::negotiate::{Negotiation, negotiate};
use crate::state::{AxisState, ConnectionPhase, ControlParameters, MotionEvent, SessionState};
use rci_protocol::*;
use tracing::{debug, info, warn};

/// 状态机输入
///
/// 命令通道和实时状态通道的所有写入都归一为这一种输入，
/// 经同一个入口串行地作用于会话。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionInput {
    /// 命令通道上的请求
    Command(Request),
    /// 实时回路报告的安全违规（已分类）
    Faults(SafetyViolationSet),
    /// 外部触发的中止（不携带违规）
    ExternalAbort,
    /// 运动按计划完成
    MotionFinished,
    /// 连接关闭
    Disconnect,
}

/// 一次转换的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub next: SessionState,
    /// 命令输入总有响应；其他输入没有
    pub response: Option<Response>,
    pub event: Option<MotionEvent>,
    /// 回复后是否关闭连接
    pub close: bool,
}

/// 命令输入的转换结果（总有响应）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandStep {
    pub next: SessionState,
    pub response: Response,
    pub event: Option<MotionEvent>,
    pub close: bool,
}

impl From<CommandStep> for Step {
    fn from(step: CommandStep) -> Self {
        Self {
            next: step.next,
            response: Some(step.response),
            event: step.event,
            close: step.close,
        }
    }
}

impl Step {
    fn unchanged(state: &SessionState) -> Self {
        Self {
            next: *state,
            response: None,
            event: None,
            close: false,
        }
    }
}

/// 计算一次转换
pub fn step(
    state: &SessionState,
    input: &SessionInput,
    server_version: ProtocolVersion,
) -> Result<Step, DriverError> {
    match input {
        SessionInput::Command(request) => command(state, request, server_version).map(Step::from),
        SessionInput::Faults(violations) => Ok(faults(state, *violations)),
        SessionInput::ExternalAbort => Ok(external_abort(state)),
        SessionInput::MotionFinished => Ok(motion_finished(state)),
        SessionInput::Disconnect => {
            if state.is_connected() {
                info!("session closed");
            }
            Ok(Step {
                next: state.cleared(),
                response: None,
                event: None,
                close: true,
            })
        },
    }
}

fn verdict<S: CommandStatus>(accepted: bool, rejected: S) -> S {
    if accepted { S::SUCCESS } else { rejected }
}

// ============================================================================
// 命令
// ============================================================================

/// 计算一条命令的转换
///
/// 会话未建立时，除 `Connect` 外的命令返回 [`DriverError::NotConnected`]。
pub fn command(
    state: &SessionState,
    request: &Request,
    server_version: ProtocolVersion,
) -> Result<CommandStep, DriverError> {
    let function = request.function_id();
    if function != FunctionId::Connect && !state.is_connected() {
        return Err(DriverError::NotConnected { function });
    }

    let mut next = *state;
    let mut event = None;
    let mut close = false;

    let response = match *request {
        Request::Connect(req) => {
            let status = connect(&mut next, req, server_version);
            close = status == ConnectStatus::IncompatibleLibraryVersion;
            Response::Connect(ConnectResponse {
                status,
                version: server_version,
            })
        },
        Request::StartMotionGenerator(req) => {
            Response::StartMotionGenerator(start_motion(&mut next, req.mode))
        },
        Request::StopMotionGenerator => {
            let (motion, previous) = next.motion.stop();
            next.motion = motion;
            if let Some(mode) = previous {
                info!(?mode, "motion generator stopped");
                event = Some(MotionEvent::Finished { mode });
            }
            Response::StopMotionGenerator(StopMotionGeneratorStatus::Success)
        },
        Request::StartController(req) => {
            Response::StartController(start_controller(&mut next, req.mode))
        },
        Request::StopController => {
            let (controller, previous) = next.controller.stop();
            next.controller = controller;
            if let Some(mode) = previous {
                info!(?mode, "controller stopped");
            }
            Response::StopController(StopControllerStatus::Success)
        },
        Request::GetCartesianLimit => {
            let accepted = !next.faulted;
            Response::GetCartesianLimit(GetCartesianLimitResponse {
                status: verdict(accepted, GetCartesianLimitStatus::Rejected),
                limit: if accepted {
                    next.parameters.cartesian_limit
                } else {
                    CartesianLimit::default()
                },
            })
        },
        Request::SetControllerMode(req) => {
            Response::SetControllerMode(set_controller_mode(&mut next, req.mode))
        },
        Request::SetCollisionBehavior(req) => {
            let accepted = configure(&mut next, request, |p| p.collision_behavior = Some(req));
            Response::SetCollisionBehavior(verdict(accepted, SetCollisionBehaviorStatus::Rejected))
        },
        Request::SetJointImpedance(req) => {
            let accepted = configure(&mut next, request, |p| p.joint_impedance = Some(req.k_theta));
            Response::SetJointImpedance(verdict(accepted, SetJointImpedanceStatus::Rejected))
        },
        Request::SetCartesianImpedance(req) => {
            let accepted = configure(&mut next, request, |p| p.cartesian_impedance = Some(req.k_x));
            Response::SetCartesianImpedance(verdict(
                accepted,
                SetCartesianImpedanceStatus::Rejected,
            ))
        },
        Request::SetGuidingMode(req) => {
            let accepted = configure(&mut next, request, |p| p.guiding_mode = Some(req));
            Response::SetGuidingMode(verdict(accepted, SetGuidingModeStatus::Rejected))
        },
        Request::SetEEToK(req) => {
            let accepted = configure(&mut next, request, |p| p.ee_t_k = Some(req.ee_t_k));
            Response::SetEEToK(verdict(accepted, SetEEToKStatus::Rejected))
        },
        Request::SetFToEE(req) => {
            let accepted = configure(&mut next, request, |p| p.f_t_ee = Some(req.f_t_ee));
            Response::SetFToEE(verdict(accepted, SetFToEEStatus::Rejected))
        },
        Request::SetLoad(req) => {
            let accepted = configure(&mut next, request, |p| p.load = Some(req));
            Response::SetLoad(verdict(accepted, SetLoadStatus::Rejected))
        },
        Request::SetTimeScalingFactor(req) => {
            let accepted = configure(&mut next, request, |p| p.time_scaling_factor = req.factor);
            Response::SetTimeScalingFactor(verdict(
                accepted,
                SetTimeScalingFactorStatus::Rejected,
            ))
        },
        Request::AutomaticErrorRecovery => {
            if next.faulted {
                info!(latched = %next.latched, "automatic error recovery");
                next.faulted = false;
                next.latched = SafetyViolationSet::empty();
                next.controller = AxisState::Idle;
                next.motion = AxisState::Idle;
            } else {
                debug!("error recovery without fault, nothing to do");
            }
            Response::AutomaticErrorRecovery(AutomaticErrorRecoveryStatus::Success)
        },
        Request::ResetExternalTorqueAndForceMax => {
            let accepted = configure(&mut next, request, |p| {
                p.external_max_resets = p.external_max_resets.saturating_add(1)
            });
            Response::ResetExternalTorqueAndForceMax(verdict(
                accepted,
                ResetExternalTorqueAndForceMaxStatus::Rejected,
            ))
        },
    };

    if !response.is_success() {
        warn!(%function, status = response.status_name(), "command not accepted");
    }

    Ok(CommandStep {
        next,
        response,
        event,
        close,
    })
}

fn connect(
    state: &mut SessionState,
    req: ConnectRequest,
    server_version: ProtocolVersion,
) -> ConnectStatus {
    if state.is_connected() {
        warn!("connect on an already connected session");
        return ConnectStatus::Rejected;
    }

    match negotiate(req.version, server_version) {
        Negotiation::Accepted(version) => {
            info!(version, udp_port = req.udp_port, "session connected");
            *state = SessionState {
                phase: ConnectionPhase::Connected,
                version: Some(version),
                udp_port: Some(req.udp_port),
                ..state.cleared()
            };
            ConnectStatus::Success
        },
        Negotiation::Rejected(_) => ConnectStatus::IncompatibleLibraryVersion,
    }
}

fn start_motion(state: &mut SessionState, mode: MotionGeneratorMode) -> StartMotionGeneratorStatus {
    if state.faulted {
        return StartMotionGeneratorStatus::Rejected;
    }
    match state.motion.activate(mode) {
        Some(active) => {
            state.motion = active;
            info!(?mode, "motion generator started");
            StartMotionGeneratorStatus::Success
        },
        None => StartMotionGeneratorStatus::Rejected,
    }
}

fn start_controller(state: &mut SessionState, mode: ControllerMode) -> StartControllerStatus {
    if state.faulted {
        return StartControllerStatus::Rejected;
    }
    match state.controller.activate(mode) {
        Some(active) => {
            state.controller = active;
            state.parameters.controller_mode = mode;
            info!(?mode, "controller started");
            StartControllerStatus::Success
        },
        None => StartControllerStatus::Rejected,
    }
}

fn set_controller_mode(state: &mut SessionState, mode: ControllerMode) -> SetControllerModeStatus {
    if state.faulted {
        return SetControllerModeStatus::Rejected;
    }
    match state.controller {
        AxisState::Starting(_) => return SetControllerModeStatus::Rejected,
        AxisState::Active(previous) => {
            info!(?previous, ?mode, "controller mode switched");
            state.controller = AxisState::Active(mode);
        },
        AxisState::Idle => {},
    }
    state.parameters.controller_mode = mode;
    SetControllerModeStatus::Success
}

/// 配置命令：故障时或参数非法时拒绝，不改变两条轴
fn configure(
    state: &mut SessionState,
    request: &Request,
    apply: impl FnOnce(&mut ControlParameters),
) -> bool {
    if state.faulted {
        return false;
    }
    if let Err(err) = request.check_parameters() {
        warn!(function = %request.function_id(), %err, "configuration refused");
        return false;
    }
    apply(&mut state.parameters);
    true
}

// ============================================================================
// 实时通道输入
// ============================================================================

fn faults(state: &SessionState, violations: SafetyViolationSet) -> Step {
    if violations.is_empty() || !state.is_connected() {
        return Step::unchanged(state);
    }

    let mut next = *state;
    next.latched = next.latched.union(violations);
    next.faulted = true;

    // 无论运动轴是否活动都发出中止通知，客户端据此得知已进入故障
    let (motion, previous) = next.motion.stop();
    next.motion = motion;
    warn!(%violations, reflex = violations.has_reflex(), "safety violation, session faulted");

    Step {
        next,
        response: None,
        event: Some(MotionEvent::Aborted {
            mode: previous,
            violations,
        }),
        close: false,
    }
}

fn external_abort(state: &SessionState) -> Step {
    let Some(mode) = state.motion.mode() else {
        return Step::unchanged(state);
    };

    let mut next = *state;
    next.motion = AxisState::Idle;
    next.faulted = true;
    warn!(?mode, "motion aborted externally");

    Step {
        next,
        response: None,
        event: Some(MotionEvent::Aborted {
            mode: Some(mode),
            violations: SafetyViolationSet::empty(),
        }),
        close: false,
    }
}

fn motion_finished(state: &SessionState) -> Step {
    let Some(mode) = state.motion.active_mode() else {
        return Step::unchanged(state);
    };

    let mut next = *state;
    next.motion = AxisState::Idle;
    info!(?mode, "motion finished");

    Step {
        next,
        response: None,
        event: Some(MotionEvent::Finished { mode }),
        close: false,
    }
}
