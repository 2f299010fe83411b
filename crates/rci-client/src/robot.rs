//! 机器人客户端
//!
//! [`Robot`] 持有命令通道和本地会话镜像。命令通道上同一时刻只允许一次交换：
//! 在途标记是一个单槽，第二个调用方会立即得到 [`ClientError::Busy`]，
//! 而不是排队。镜像只在持有单槽时写入，读取通过 `ArcSwap` 无锁进行。

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::mirror::{MotionNotification, RobotSession};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rci_driver::{Negotiation, negotiate};
use rci_protocol::*;
use rci_transport::{CommandTransport, TransportError, hex_dump};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// 从响应中取出期望的变体
///
/// `decode_response` 已保证功能 ID 一致，不一致时按功能 ID 不匹配处理。
macro_rules! expect_response {
    ($response:expr, $variant:ident) => {
        match $response {
            Response::$variant(inner) => Ok(inner),
            other => Err(ClientError::Protocol(ProtocolError::FunctionMismatch {
                expected: FunctionId::$variant,
                actual: other.function_id(),
            })),
        }
    };
}

/// 单槽在途标记的占用守卫，离开作用域时释放
struct SlotGuard<'a> {
    slot: &'a Mutex<Option<FunctionId>>,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

/// 机器人客户端
pub struct Robot<T: CommandTransport> {
    transport: Mutex<T>,
    /// 在途命令（单槽）
    in_flight: Mutex<Option<FunctionId>>,
    session: ArcSwap<RobotSession>,
    /// 交换期间收到的运动结束通知
    notifications: Mutex<VecDeque<MotionNotification>>,
    config: ClientConfig,
}

impl<T: CommandTransport> Robot<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            transport: Mutex::new(transport),
            in_flight: Mutex::new(None),
            session: ArcSwap::from_pointee(RobotSession::default()),
            notifications: Mutex::new(VecDeque::new()),
            config,
        }
    }

    /// 使用默认配置
    pub fn with_defaults(transport: T) -> Self {
        Self::new(transport, ClientConfig::default())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// 会话镜像副本（无锁）
    pub fn session(&self) -> RobotSession {
        **self.session.load()
    }

    /// 会话镜像快照（无锁）
    pub fn session_snapshot(&self) -> Arc<RobotSession> {
        self.session.load_full()
    }

    /// 当前在途的命令
    pub fn outstanding(&self) -> Option<FunctionId> {
        *self.in_flight.lock()
    }

    // ==================== 会话 ====================

    /// 建立会话
    ///
    /// 版本不一致时关闭连接并返回 [`ClientError::IncompatibleVersion`]；
    /// 已连接时控制器回复 `Rejected`。
    pub fn connect(&self) -> Result<ConnectStatus, ClientError> {
        let request = Request::Connect(ConnectRequest::with_version(
            self.config.protocol_version,
            self.config.udp_port,
        ));
        let response = expect_response!(self.exchange(request)?, Connect)?;

        match response.status {
            ConnectStatus::Success => {
                if let Negotiation::Rejected(err) =
                    negotiate(self.config.protocol_version, response.version)
                {
                    self.close_transport();
                    return Err(err.into());
                }
                info!(
                    version = response.version,
                    udp_port = self.config.udp_port,
                    "connected"
                );
            },
            ConnectStatus::IncompatibleLibraryVersion => {
                warn!(
                    client = self.config.protocol_version,
                    server = response.version,
                    "controller rejected protocol version"
                );
                self.close_transport();
                return Err(ClientError::IncompatibleVersion {
                    client: self.config.protocol_version,
                    server: response.version,
                });
            },
            ConnectStatus::Rejected => warn!("controller reports session already connected"),
        }
        Ok(response.status)
    }

    /// 关闭连接，本地会话随之销毁
    pub fn disconnect(&self) -> Result<(), ClientError> {
        let _slot = self.claim(FunctionId::Connect)?;
        self.close_transport();
        info!("disconnected");
        Ok(())
    }

    fn close_transport(&self) {
        self.transport.lock().close();
        self.update(RobotSession::reset);
    }

    /// 收取运动结束通知
    ///
    /// 通知是 `StartMotionGenerator` 的异步响应（`Finished` / `Aborted`），
    /// 因此轮询同样占用单槽。
    pub fn poll_events(&self) -> Result<Vec<MotionNotification>, ClientError> {
        let _slot = self.claim(FunctionId::StartMotionGenerator)?;
        self.drain_pending(&mut *self.transport.lock())?;
        Ok(self.notifications.lock().drain(..).collect())
    }

    /// 取走通道上已到达的帧：记录通知，丢弃迟到的响应
    ///
    /// 超时之后控制器仍可能送来那次交换的响应，留在通道里会被下一次交换
    /// 当作自己的响应读到。
    fn drain_pending(&self, transport: &mut T) -> Result<(), ClientError> {
        while let Some(frame) = transport.try_receive()? {
            match notification_status(&frame) {
                Some(status) => self.record_notification(status),
                None => debug!(frame = %hex_dump(&frame), "discarding stale response"),
            }
        }
        Ok(())
    }

    // ==================== 交换 ====================

    /// 执行任意命令
    ///
    /// 参数先在本地校验，不合法时不发送。返回的响应状态可能是非成功值，
    /// 调用方必须检查状态。
    pub fn execute(&self, request: Request) -> Result<Response, ClientError> {
        self.exchange(request)
    }

    fn exchange(&self, request: Request) -> Result<Response, ClientError> {
        let function = request.function_id();
        if function != FunctionId::Connect && !self.session.load().is_connected() {
            return Err(ClientError::NotConnected);
        }
        request.check_parameters()?;

        let _slot = self.claim(function)?;
        let mut transport = self.transport.lock();
        self.drain_pending(&mut *transport)?;
        self.update(|s| s.begin(&request));

        let frame = encode_request(&request);
        trace!(%function, frame = %hex_dump(&frame), "send");
        if let Err(err) = transport.send(&frame) {
            self.update(|s| s.lost(function));
            return Err(err.into());
        }

        let deadline = Instant::now() + self.config.response_timeout();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let frame = match transport.receive_timeout(remaining) {
                Ok(frame) => frame,
                Err(TransportError::Timeout) => {
                    self.update(|s| s.lost(function));
                    return Err(ClientError::NoResponse { function });
                },
                Err(err) => {
                    self.update(|s| s.lost(function));
                    return Err(err.into());
                },
            };

            if let Some(status) = notification_status(&frame) {
                self.record_notification(status);
                continue;
            }
            if let Ok(late) = peek_function(&frame) {
                if late != function && self.session.load().outcome_unknown.contains(late) {
                    debug!(%late, %function, "discarding late response of an unresolved command");
                    continue;
                }
            }

            match decode_response(&frame, function) {
                Ok(response) => {
                    debug!(%function, status = response.status_name(), "response");
                    self.update(|s| s.complete(&request, &response));
                    return Ok(response);
                },
                Err(err) => {
                    warn!(%function, frame = %hex_dump(&frame), %err, "malformed response");
                    self.update(|s| s.lost(function));
                    return Err(err.into());
                },
            }
        }
    }

    fn claim(&self, function: FunctionId) -> Result<SlotGuard<'_>, ClientError> {
        let mut slot = self.in_flight.lock();
        if let Some(outstanding) = *slot {
            return Err(ClientError::Busy { outstanding });
        }
        *slot = Some(function);
        Ok(SlotGuard {
            slot: &self.in_flight,
        })
    }

    /// 修改并发布镜像（仅在持有单槽时调用）
    fn update<R>(&self, f: impl FnOnce(&mut RobotSession) -> R) -> R {
        let mut session = **self.session.load();
        let output = f(&mut session);
        self.session.store(Arc::new(session));
        output
    }

    fn record_notification(&self, status: StartMotionGeneratorStatus) {
        let notification = self.update(|s| s.notify(status));
        debug!(?notification, "motion notification");
        self.notifications.lock().push_back(notification);
    }

    // ==================== 运动生成器 / 控制器 ====================

    pub fn start_motion_generator(
        &self,
        mode: MotionGeneratorMode,
    ) -> Result<StartMotionGeneratorStatus, ClientError> {
        let request = Request::StartMotionGenerator(StartMotionGeneratorRequest { mode });
        expect_response!(self.exchange(request)?, StartMotionGenerator)
    }

    pub fn stop_motion_generator(&self) -> Result<StopMotionGeneratorStatus, ClientError> {
        expect_response!(
            self.exchange(Request::StopMotionGenerator)?,
            StopMotionGenerator
        )
    }

    pub fn start_controller(
        &self,
        mode: ControllerMode,
    ) -> Result<StartControllerStatus, ClientError> {
        let request = Request::StartController(StartControllerRequest { mode });
        expect_response!(self.exchange(request)?, StartController)
    }

    pub fn stop_controller(&self) -> Result<StopControllerStatus, ClientError> {
        expect_response!(self.exchange(Request::StopController)?, StopController)
    }

    pub fn set_controller_mode(
        &self,
        mode: ControllerMode,
    ) -> Result<SetControllerModeStatus, ClientError> {
        let request = Request::SetControllerMode(SetControllerModeRequest { mode });
        expect_response!(self.exchange(request)?, SetControllerMode)
    }

    // ==================== 配置 ====================

    pub fn get_cartesian_limit(&self) -> Result<GetCartesianLimitResponse, ClientError> {
        expect_response!(self.exchange(Request::GetCartesianLimit)?, GetCartesianLimit)
    }

    pub fn set_collision_behavior(
        &self,
        thresholds: SetCollisionBehaviorRequest,
    ) -> Result<SetCollisionBehaviorStatus, ClientError> {
        expect_response!(
            self.exchange(Request::SetCollisionBehavior(thresholds))?,
            SetCollisionBehavior
        )
    }

    /// 关节刚度（7 个关节）
    pub fn set_joint_impedance(
        &self,
        k_theta: [f64; JOINT_COUNT],
    ) -> Result<SetJointImpedanceStatus, ClientError> {
        let request = Request::SetJointImpedance(SetJointImpedanceRequest { k_theta });
        expect_response!(self.exchange(request)?, SetJointImpedance)
    }

    /// 笛卡尔刚度（x, y, z, roll, pitch, yaw）
    pub fn set_cartesian_impedance(
        &self,
        k_x: [f64; CARTESIAN_DOF],
    ) -> Result<SetCartesianImpedanceStatus, ClientError> {
        let request = Request::SetCartesianImpedance(SetCartesianImpedanceRequest { k_x });
        expect_response!(self.exchange(request)?, SetCartesianImpedance)
    }

    pub fn set_guiding_mode(
        &self,
        guiding_mode: [bool; CARTESIAN_DOF],
        nullspace: bool,
    ) -> Result<SetGuidingModeStatus, ClientError> {
        let request = Request::SetGuidingMode(SetGuidingModeRequest {
            guiding_mode,
            nullspace,
        });
        expect_response!(self.exchange(request)?, SetGuidingMode)
    }

    /// 末端到 K 坐标系的变换（4×4 列主序）
    pub fn set_ee_to_k(&self, ee_t_k: [f64; TRANSFORM_LEN]) -> Result<SetEEToKStatus, ClientError> {
        expect_response!(
            self.exchange(Request::SetEEToK(SetEEToKRequest { ee_t_k }))?,
            SetEEToK
        )
    }

    /// 法兰到末端的变换（4×4 列主序）
    pub fn set_f_to_ee(&self, f_t_ee: [f64; TRANSFORM_LEN]) -> Result<SetFToEEStatus, ClientError> {
        expect_response!(
            self.exchange(Request::SetFToEE(SetFToEERequest { f_t_ee }))?,
            SetFToEE
        )
    }

    pub fn set_load(
        &self,
        mass: f64,
        center_of_mass: [f64; 3],
        inertia: [f64; 9],
    ) -> Result<SetLoadStatus, ClientError> {
        let request = Request::SetLoad(SetLoadRequest {
            mass,
            center_of_mass,
            inertia,
        });
        expect_response!(self.exchange(request)?, SetLoad)
    }

    /// 时间缩放因子，取值 (0, 1]
    pub fn set_time_scaling_factor(
        &self,
        factor: f64,
    ) -> Result<SetTimeScalingFactorStatus, ClientError> {
        let request = Request::SetTimeScalingFactor(SetTimeScalingFactorRequest { factor });
        expect_response!(self.exchange(request)?, SetTimeScalingFactor)
    }

    pub fn automatic_error_recovery(&self) -> Result<AutomaticErrorRecoveryStatus, ClientError> {
        expect_response!(
            self.exchange(Request::AutomaticErrorRecovery)?,
            AutomaticErrorRecovery
        )
    }

    pub fn reset_external_torque_and_force_max(
        &self,
    ) -> Result<ResetExternalTorqueAndForceMaxStatus, ClientError> {
        expect_response!(
            self.exchange(Request::ResetExternalTorqueAndForceMax)?,
            ResetExternalTorqueAndForceMax
        )
    }
}

/// 运动结束通知帧：`StartMotionGenerator` + `Finished` / `Aborted`
///
/// 同步的 `StartMotionGenerator` 回复只会是 `Success` / `InvalidType` / `Rejected`，
/// 两者不会混淆。
fn notification_status(frame: &[u8]) -> Option<StartMotionGeneratorStatus> {
    if peek_function(frame).ok()? != FunctionId::StartMotionGenerator {
        return None;
    }
    match decode_response(frame, FunctionId::StartMotionGenerator).ok()? {
        Response::StartMotionGenerator(
            status @ (StartMotionGeneratorStatus::Finished | StartMotionGeneratorStatus::Aborted),
        ) => Some(status),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use crossbeam_channel::{Receiver, Sender, unbounded};
    use rci_transport::MockTransport;
    use std::thread;
    use std::time::Duration;

    fn reply(response: Response) -> Bytes {
        encode_response(&response)
    }

    fn connected_robot() -> (Robot<MockTransport>, MockTransport) {
        let transport = MockTransport::new();
        let handle = transport.clone();
        let robot = Robot::with_defaults(transport);
        handle.queue_reply(reply(Response::Connect(ConnectResponse::new(
            ConnectStatus::Success,
        ))));
        assert_eq!(robot.connect().unwrap(), ConnectStatus::Success);
        handle.take_sent();
        (robot, handle)
    }

    #[test]
    fn test_connect_sends_configured_version_and_port() {
        let transport = MockTransport::new();
        let handle = transport.clone();
        let config = ClientConfig {
            udp_port: 4000,
            ..ClientConfig::default()
        };
        let robot = Robot::new(transport, config);
        handle.queue_reply(reply(Response::Connect(ConnectResponse::new(
            ConnectStatus::Success,
        ))));
        robot.connect().unwrap();

        let sent = handle.take_sent();
        assert_eq!(
            decode_request(&sent[0]).unwrap(),
            Request::Connect(ConnectRequest::with_version(PROTOCOL_VERSION, 4000))
        );
        assert!(robot.session().is_connected());
    }

    #[test]
    fn test_incompatible_version_closes() {
        let transport = MockTransport::new();
        let handle = transport.clone();
        let robot = Robot::with_defaults(transport);
        handle.queue_reply(reply(Response::Connect(ConnectResponse {
            status: ConnectStatus::IncompatibleLibraryVersion,
            version: 9,
        })));

        let err = robot.connect().unwrap_err();
        assert!(matches!(
            err,
            ClientError::IncompatibleVersion {
                client: 1,
                server: 9
            }
        ));
        assert!(handle.is_closed());
        assert!(!robot.session().is_connected());
    }

    #[test]
    fn test_commands_require_connection() {
        let robot = Robot::with_defaults(MockTransport::new());
        assert!(matches!(
            robot.stop_controller(),
            Err(ClientError::NotConnected)
        ));
    }

    #[test]
    fn test_invalid_argument_is_not_sent() {
        let (robot, handle) = connected_robot();
        let err = robot.set_time_scaling_factor(0.0).unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));
        assert!(handle.take_sent().is_empty());
    }

    #[test]
    fn test_no_response_marks_outcome_unknown() {
        let (robot, handle) = connected_robot();
        handle.queue_timeout();
        let err = robot
            .start_controller(ControllerMode::JointImpedance)
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::NoResponse {
                function: FunctionId::StartController
            }
        ));
        assert!(robot
            .session()
            .outcome_unknown
            .contains(FunctionId::StartController));
        // 单槽已释放
        assert_eq!(robot.outstanding(), None);
    }

    #[test]
    fn test_late_reply_after_timeout_is_discarded() {
        let (robot, handle) = connected_robot();
        handle.queue_timeout();
        assert!(robot.start_controller(ControllerMode::JointImpedance).is_err());

        // 超时之后才到达的响应
        handle.push_unsolicited(reply(Response::StartController(
            StartControllerStatus::Success,
        )));
        handle.queue_reply(reply(Response::StopController(StopControllerStatus::Success)));
        handle.queue_reply(reply(Response::SetTimeScalingFactor(
            SetTimeScalingFactorStatus::Success,
        )));

        assert_eq!(robot.stop_controller().unwrap(), StopControllerStatus::Success);
        assert_eq!(
            robot.set_time_scaling_factor(0.5).unwrap(),
            SetTimeScalingFactorStatus::Success
        );
        let session = robot.session();
        assert!(!session.is_outcome_unknown());
        assert!(session.state.controller.is_idle());
        assert_eq!(session.state.parameters.time_scaling_factor, 0.5);
        assert_eq!(handle.pending_replies(), 0);
    }

    #[test]
    fn test_late_reply_during_exchange_is_skipped() {
        let (robot, handle) = connected_robot();
        handle.queue_timeout();
        assert!(robot.start_controller(ControllerMode::MotorPD).is_err());

        // 迟到的响应与下一条响应一起到达
        handle.queue_replies([
            reply(Response::StartController(StartControllerStatus::Success)),
            reply(Response::SetLoad(SetLoadStatus::Success)),
        ]);
        assert_eq!(
            robot.set_load(0.4, [0.0; 3], [0.0; 9]).unwrap(),
            SetLoadStatus::Success
        );
        let session = robot.session();
        assert!(session.outcome_unknown.contains(FunctionId::StartController));
        assert_eq!(session.state.parameters.load.map(|l| l.mass), Some(0.4));
    }

    #[test]
    fn test_function_mismatch_is_protocol_error() {
        let (robot, handle) = connected_robot();
        handle.queue_reply(reply(Response::StopMotionGenerator(
            StopMotionGeneratorStatus::Success,
        )));
        let err = robot.stop_controller().unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::FunctionMismatch {
                expected: FunctionId::StopController,
                actual: FunctionId::StopMotionGenerator
            })
        ));
        assert!(err.is_outcome_unknown());
        assert!(robot.session().is_outcome_unknown());
    }

    #[test]
    fn test_truncated_response_is_protocol_error() {
        let (robot, handle) = connected_robot();
        let frame = reply(Response::GetCartesianLimit(GetCartesianLimitResponse {
            status: GetCartesianLimitStatus::Success,
            limit: CartesianLimit::default(),
        }));
        handle.queue_reply(frame.slice(..frame.len() - 8));
        let err = robot.get_cartesian_limit().unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_notification_during_exchange() {
        let (robot, handle) = connected_robot();
        handle.queue_reply(reply(Response::StartMotionGenerator(
            StartMotionGeneratorStatus::Success,
        )));
        assert_eq!(
            robot
                .start_motion_generator(MotionGeneratorMode::JointPosition)
                .unwrap(),
            StartMotionGeneratorStatus::Success
        );

        // 中止通知先于下一条响应到达
        handle.queue_replies([
            reply(Response::StartMotionGenerator(StartMotionGeneratorStatus::Aborted)),
            reply(Response::SetLoad(SetLoadStatus::Rejected)),
        ]);
        assert_eq!(
            robot.set_load(1.0, [0.0; 3], [0.0; 9]).unwrap(),
            SetLoadStatus::Rejected
        );

        let session = robot.session();
        assert!(session.state.faulted);
        assert!(session.state.motion.is_idle());

        let events = robot.poll_events().unwrap();
        assert_eq!(
            events,
            vec![MotionNotification {
                mode: Some(MotionGeneratorMode::JointPosition),
                status: StartMotionGeneratorStatus::Aborted,
            }]
        );
        assert!(robot.poll_events().unwrap().is_empty());
    }

    #[test]
    fn test_rejected_configuration_marks_mirror_faulted() {
        let (robot, handle) = connected_robot();
        handle.queue_reply(reply(Response::StartController(StartControllerStatus::Success)));
        robot.start_controller(ControllerMode::JointImpedance).unwrap();

        // 没有收到中止通知，只有配置命令被拒绝
        handle.queue_reply(reply(Response::SetTimeScalingFactor(
            SetTimeScalingFactorStatus::Rejected,
        )));
        assert_eq!(
            robot.set_time_scaling_factor(0.5).unwrap(),
            SetTimeScalingFactorStatus::Rejected
        );
        assert!(robot.session().state.faulted);

        handle.queue_reply(reply(Response::AutomaticErrorRecovery(
            AutomaticErrorRecoveryStatus::Success,
        )));
        robot.automatic_error_recovery().unwrap();
        let session = robot.session();
        assert!(!session.state.faulted);
        assert!(session.state.controller.is_idle());
    }

    /// 接收阻塞在通道上，直到测试放行；每次发送都通知测试
    struct GatedTransport {
        replies: Receiver<Bytes>,
        sent: Sender<()>,
    }

    impl CommandTransport for GatedTransport {
        fn send(&mut self, _frame: &[u8]) -> Result<(), TransportError> {
            self.sent.send(()).map_err(|_| TransportError::Closed)
        }

        fn receive_timeout(&mut self, timeout: Duration) -> Result<Bytes, TransportError> {
            self.replies
                .recv_timeout(timeout)
                .map_err(|_| TransportError::Timeout)
        }
    }

    #[test]
    fn test_second_exchange_is_busy() {
        let (gate, replies): (Sender<Bytes>, _) = unbounded();
        let (sent, requests): (_, Receiver<()>) = unbounded();
        let robot = Robot::with_defaults(GatedTransport { replies, sent });

        thread::scope(|scope| {
            let connecting = scope.spawn(|| robot.connect());
            requests.recv().unwrap();
            gate.send(reply(Response::Connect(ConnectResponse::new(
                ConnectStatus::Success,
            ))))
            .unwrap();
            connecting.join().unwrap().unwrap();

            let worker = scope.spawn(|| robot.stop_controller());
            requests.recv().unwrap();
            assert_eq!(robot.outstanding(), Some(FunctionId::StopController));
            let err = robot
                .start_controller(ControllerMode::MotorPD)
                .unwrap_err();
            assert!(matches!(
                err,
                ClientError::Busy {
                    outstanding: FunctionId::StopController
                }
            ));
            assert!(matches!(robot.poll_events(), Err(ClientError::Busy { .. })));

            gate.send(reply(Response::StopController(StopControllerStatus::Success)))
                .unwrap();
            assert_eq!(
                worker.join().unwrap().unwrap(),
                StopControllerStatus::Success
            );
        });
        assert_eq!(robot.outstanding(), None);
    }

    #[test]
    fn test_disconnect_resets_mirror() {
        let (robot, handle) = connected_robot();
        robot.disconnect().unwrap();
        assert!(handle.is_closed());
        assert_eq!(robot.session(), RobotSession::default());
    }
}
