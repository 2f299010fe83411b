//! 会话端到端场景
//!
//! 客户端 [`Robot`] 经 [`ServerLoopback`] 直接驱动控制器侧状态机。

use crossbeam_channel::Receiver;
use rci_sdk::driver::LoopbackControl;
use rci_sdk::prelude::*;
use rci_sdk::protocol::{
    ConnectStatus, StartControllerStatus, StartMotionGeneratorStatus, PROTOCOL_VERSION,
};

struct Harness {
    robot: Robot<ServerLoopback>,
    server: CommandServer,
    control: LoopbackControl,
    events: Receiver<MotionEvent>,
}

fn harness_with(config: ClientConfig) -> Harness {
    let (server, events) = ControllerBuilder::new().build();
    let transport = ServerLoopback::new(server.clone());
    let control = transport.control();
    Harness {
        robot: Robot::new(transport, config),
        server,
        control,
        events,
    }
}

fn connected() -> Harness {
    let h = harness_with(ClientConfig::default());
    assert_eq!(h.robot.connect().unwrap(), ConnectStatus::Success);
    h
}

fn violations(list: &[SafetyViolation]) -> SafetyViolationSet {
    list.iter().copied().collect()
}

#[test]
fn test_controller_lifecycle_scenario() {
    let h = connected();
    let session = h.robot.session();
    assert!(session.is_connected());
    assert_eq!(session.state.version, Some(PROTOCOL_VERSION));

    assert_eq!(
        h.robot.start_controller(ControllerMode::JointImpedance).unwrap(),
        StartControllerStatus::Success
    );
    assert_eq!(
        h.server.session().state().controller,
        AxisState::Active(ControllerMode::JointImpedance)
    );
    assert_eq!(
        h.robot.session().state.controller,
        AxisState::Active(ControllerMode::JointImpedance)
    );

    // 控制器已激活，再次启动被拒绝
    assert_eq!(
        h.robot.start_controller(ControllerMode::MotorPD).unwrap(),
        StartControllerStatus::Rejected
    );
    assert_eq!(
        h.server.session().state().controller,
        AxisState::Active(ControllerMode::JointImpedance)
    );

    assert!(h.robot.stop_controller().unwrap().is_success());
    assert!(h.server.session().state().controller.is_idle());
    assert!(h.robot.session().state.controller.is_idle());
}

#[test]
fn test_stop_controller_is_idempotent() {
    let h = connected();
    h.robot.start_controller(ControllerMode::JointImpedance).unwrap();

    assert!(h.robot.stop_controller().unwrap().is_success());
    assert!(h.robot.stop_controller().unwrap().is_success());
    assert!(h.server.session().state().controller.is_idle());
}

#[test]
fn test_second_motion_start_keeps_active_mode() {
    let h = connected();
    assert_eq!(
        h.robot
            .start_motion_generator(MotionGeneratorMode::JointPosition)
            .unwrap(),
        StartMotionGeneratorStatus::Success
    );
    assert_eq!(
        h.robot
            .start_motion_generator(MotionGeneratorMode::CartesianVelocity)
            .unwrap(),
        StartMotionGeneratorStatus::Rejected
    );
    assert_eq!(
        h.server.session().state().motion,
        AxisState::Active(MotionGeneratorMode::JointPosition)
    );
    assert_eq!(
        h.robot.session().state.motion,
        AxisState::Active(MotionGeneratorMode::JointPosition)
    );
}

#[test]
fn test_version_mismatch_leaves_no_session() {
    let config = ClientConfig {
        protocol_version: PROTOCOL_VERSION + 1,
        ..ClientConfig::default()
    };
    let h = harness_with(config);

    let err = h.robot.connect().unwrap_err();
    assert!(matches!(
        err,
        ClientError::IncompatibleVersion { client, server }
            if client == PROTOCOL_VERSION + 1 && server == PROTOCOL_VERSION
    ));
    assert!(!h.robot.session().is_connected());
    assert!(!h.server.session().state().is_connected());

    // 连接已关闭
    assert!(matches!(
        h.robot.stop_controller(),
        Err(ClientError::NotConnected)
    ));
}

#[test]
fn test_fault_requires_recovery_before_restart() {
    let h = connected();
    h.robot
        .start_motion_generator(MotionGeneratorMode::CartesianPosition)
        .unwrap();

    let faults = violations(&[
        SafetyViolation::CartesianReflex,
        SafetyViolation::PowerLimitViolation,
    ]);
    h.server.session().inject_faults(faults).unwrap();

    let state = h.server.session().state();
    assert!(state.faulted);
    assert!(state.motion.is_idle());
    assert_eq!(state.latched, faults);

    // 控制器侧事件带有具体违规
    let event = h.events.try_recv().unwrap();
    assert_eq!(
        event,
        MotionEvent::Aborted {
            mode: Some(MotionGeneratorMode::CartesianPosition),
            violations: faults,
        }
    );

    // 客户端通过通知得知中止
    let notifications = h.robot.poll_events().unwrap();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].is_aborted());
    assert_eq!(
        notifications[0].mode,
        Some(MotionGeneratorMode::CartesianPosition)
    );
    assert!(h.robot.session().state.faulted);
    assert!(h.robot.session().state.motion.is_idle());

    assert_eq!(
        h.robot
            .start_motion_generator(MotionGeneratorMode::CartesianPosition)
            .unwrap(),
        StartMotionGeneratorStatus::Rejected
    );

    assert!(h.robot.automatic_error_recovery().unwrap().is_success());
    assert!(!h.server.session().state().faulted);
    assert!(h.server.session().state().latched.is_empty());
    assert!(!h.robot.session().state.faulted);

    assert_eq!(
        h.robot
            .start_motion_generator(MotionGeneratorMode::CartesianPosition)
            .unwrap(),
        StartMotionGeneratorStatus::Success
    );
}

#[test]
fn test_raw_safety_flags_classified_on_report() {
    let h = connected();
    h.robot
        .start_motion_generator(MotionGeneratorMode::JointVelocity)
        .unwrap();

    let raw = rci_sdk::protocol::RawSafetyFlags::from(
        1u64 << SafetyViolation::JointVelocityViolation as u8,
    );
    h.server.session().report_safety_flags(raw).unwrap();

    let state = h.server.session().state();
    assert!(state.faulted);
    assert!(state.latched.contains(SafetyViolation::JointVelocityViolation));
    assert_eq!(state.latched.len(), 1);
}

#[test]
fn test_motion_finished_notification() {
    let h = connected();
    h.robot
        .start_motion_generator(MotionGeneratorMode::JointPosition)
        .unwrap();
    h.server.session().finish_motion().unwrap();

    let notifications = h.robot.poll_events().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].status, StartMotionGeneratorStatus::Finished);
    assert!(!h.robot.session().state.faulted);
    assert!(h.robot.session().state.motion.is_idle());

    // 计划内完成不触发故障
    assert!(!h.server.session().state().faulted);
}

#[test]
fn test_notification_during_exchange_is_kept() {
    let h = connected();
    h.robot
        .start_motion_generator(MotionGeneratorMode::JointPosition)
        .unwrap();
    h.server.session().abort_motion().unwrap();

    // 下一次交换在发送前先取走通知帧
    assert!(h.robot.stop_controller().unwrap().is_success());
    assert!(h.robot.session().state.faulted);

    let notifications = h.robot.poll_events().unwrap();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].is_aborted());
}

#[test]
fn test_lost_reply_marks_outcome_unknown_until_stop() {
    let h = connected();
    h.control.drop_next_reply();

    let err = h
        .robot
        .start_controller(ControllerMode::CartesianImpedance)
        .unwrap_err();
    assert!(matches!(err, ClientError::NoResponse { .. }));
    assert!(err.is_outcome_unknown());
    assert!(h
        .robot
        .session()
        .outcome_unknown
        .contains(FunctionId::StartController));
    // 控制器侧其实已经执行
    assert_eq!(
        h.server.session().state().controller,
        AxisState::Active(ControllerMode::CartesianImpedance)
    );

    assert!(h.robot.stop_controller().unwrap().is_success());
    assert!(h.robot.session().outcome_unknown.is_empty());
    assert!(h.server.session().state().controller.is_idle());
}

#[test]
fn test_two_lost_replies_stay_unknown_independently() {
    let h = connected();
    h.control.drop_next_reply();
    assert!(h.robot.start_controller(ControllerMode::JointImpedance).is_err());
    h.control.drop_next_reply();
    assert!(h.robot.set_load(1.2, [0.0, 0.0, 0.05], [0.0; 9]).is_err());
    assert_eq!(h.robot.session().outcome_unknown.len(), 2);

    assert!(h
        .robot
        .set_load(1.2, [0.0, 0.0, 0.05], [0.0; 9])
        .unwrap()
        .is_success());
    let session = h.robot.session();
    assert!(!session.outcome_unknown.contains(FunctionId::SetLoad));
    assert!(session.outcome_unknown.contains(FunctionId::StartController));
    assert_eq!(
        session.state.controller,
        AxisState::Starting(ControllerMode::JointImpedance)
    );

    assert!(h.robot.stop_controller().unwrap().is_success());
    assert!(!h.robot.session().is_outcome_unknown());
}

#[test]
fn test_fault_without_motion_reaches_client() {
    let h = connected();
    h.robot.start_controller(ControllerMode::JointImpedance).unwrap();

    let faults = violations(&[SafetyViolation::PowerLimitViolation]);
    h.server.session().inject_faults(faults).unwrap();
    assert_eq!(
        h.events.try_recv().unwrap(),
        MotionEvent::Aborted {
            mode: None,
            violations: faults,
        }
    );

    let notifications = h.robot.poll_events().unwrap();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].is_aborted());
    assert_eq!(notifications[0].mode, None);
    assert!(h.robot.session().state.faulted);

    assert!(h.robot.automatic_error_recovery().unwrap().is_success());
    assert!(h.server.session().state().controller.is_idle());
    let session = h.robot.session();
    assert!(session.state.controller.is_idle());
    assert!(!session.state.faulted);
    assert_eq!(session.state.controller, h.server.session().state().controller);
}

#[test]
fn test_configuration_commands() {
    let h = connected();

    assert!(h.robot.set_joint_impedance([1000.0; 7]).unwrap().is_success());
    assert!(
        h.robot
            .set_cartesian_impedance([3000.0, 3000.0, 3000.0, 300.0, 300.0, 300.0])
            .unwrap()
            .is_success()
    );
    assert!(h.robot.set_time_scaling_factor(0.5).unwrap().is_success());
    assert!(
        h.robot
            .reset_external_torque_and_force_max()
            .unwrap()
            .is_success()
    );

    let server = h.server.session().state().parameters;
    let mirror = h.robot.session().state.parameters;
    assert_eq!(server.joint_impedance, Some([1000.0; 7]));
    assert_eq!(server.time_scaling_factor, 0.5);
    assert_eq!(server.external_max_resets, 1);
    assert_eq!(mirror.joint_impedance, server.joint_impedance);
    assert_eq!(mirror.cartesian_impedance, server.cartesian_impedance);
    assert_eq!(mirror.time_scaling_factor, 0.5);
    assert_eq!(mirror.external_max_resets, 1);
}

#[test]
fn test_cartesian_limit_query() {
    let h = connected();
    let response = h.robot.get_cartesian_limit().unwrap();
    assert!(response.status.is_success());
    assert_eq!(
        response.limit,
        h.server.session().state().parameters.cartesian_limit
    );
    assert_eq!(
        h.robot.session().state.parameters.cartesian_limit,
        response.limit
    );
}

#[test]
fn test_disconnect_then_reconnect() {
    let h = connected();
    h.robot.start_controller(ControllerMode::JointImpedance).unwrap();
    h.robot.disconnect().unwrap();

    assert!(!h.robot.session().is_connected());
    let state = h.server.session().state();
    assert!(!state.is_connected());
    assert!(state.controller.is_idle());
}
