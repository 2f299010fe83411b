//! 请求结构体定义
//!
//! 包含所有命令请求的负载结构体，以及覆盖 17 个命令的请求和类型 [`Request`]。
//! 每个负载的线上布局固定，由 [`WirePayload`] 实现描述。

use crate::codec::{WirePayload, get_bool, get_f64_array, put_bool, put_f64_array};
use crate::constants::{CARTESIAN_DOF, JOINT_COUNT, PROTOCOL_VERSION, TRANSFORM_LEN};
use crate::ids::{FunctionId, ProtocolVersion};
use crate::ProtocolError;
use bytes::{Buf, BufMut, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

// ============================================================================
// 模式枚举
// ============================================================================

/// 运动生成器模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum MotionGeneratorMode {
    JointPosition = 0,
    JointVelocity = 1,
    CartesianPosition = 2,
    CartesianVelocity = 3,
}

/// 控制器模式（底层控制律）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum ControllerMode {
    MotorPD = 0,
    JointPosition = 1,
    #[default]
    JointImpedance = 2,
    CartesianImpedance = 3,
}

impl WirePayload for MotionGeneratorMode {
    const WIRE_LEN: usize = 4;

    fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u32_le((*self).into());
    }

    fn read_from(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        let value = buf.get_u32_le();
        Self::try_from(value).map_err(|_| ProtocolError::InvalidValue {
            field: "MotionGeneratorMode",
            value,
        })
    }
}

impl WirePayload for ControllerMode {
    const WIRE_LEN: usize = 4;

    fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u32_le((*self).into());
    }

    fn read_from(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        let value = buf.get_u32_le();
        Self::try_from(value).map_err(|_| ProtocolError::InvalidValue {
            field: "ControllerMode",
            value,
        })
    }
}

// ============================================================================
// 参数校验
// ============================================================================

/// 配置参数非法
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid parameter {field}: {reason}")]
pub struct ParameterError {
    pub field: &'static str,
    pub reason: &'static str,
}

fn check_finite(field: &'static str, values: &[f64]) -> Result<(), ParameterError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ParameterError {
            field,
            reason: "must be finite",
        })
    }
}

// ============================================================================
// 连接请求
// ============================================================================

/// 连接请求
///
/// 布局：`version: u16` + `udp_port: u16`（4 字节）。
/// `udp_port` 是客户端接收实时状态流的端口。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectRequest {
    pub version: ProtocolVersion,
    pub udp_port: u16,
}

impl ConnectRequest {
    /// 使用当前协议版本创建连接请求
    pub fn new(udp_port: u16) -> Self {
        Self::with_version(PROTOCOL_VERSION, udp_port)
    }

    /// 使用指定协议版本创建连接请求
    pub fn with_version(version: ProtocolVersion, udp_port: u16) -> Self {
        Self { version, udp_port }
    }
}

impl WirePayload for ConnectRequest {
    const WIRE_LEN: usize = 4;

    fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.version);
        buf.put_u16_le(self.udp_port);
    }

    fn read_from(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            version: buf.get_u16_le(),
            udp_port: buf.get_u16_le(),
        })
    }
}

// ============================================================================
// 控制器 / 运动生成器生命周期请求
// ============================================================================

/// 启动运动生成器请求（4 字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StartMotionGeneratorRequest {
    pub mode: MotionGeneratorMode,
}

impl WirePayload for StartMotionGeneratorRequest {
    const WIRE_LEN: usize = MotionGeneratorMode::WIRE_LEN;

    fn write_to(&self, buf: &mut BytesMut) {
        self.mode.write_to(buf);
    }

    fn read_from(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            mode: MotionGeneratorMode::read_from(buf)?,
        })
    }
}

/// 启动控制器请求（4 字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StartControllerRequest {
    pub mode: ControllerMode,
}

impl WirePayload for StartControllerRequest {
    const WIRE_LEN: usize = ControllerMode::WIRE_LEN;

    fn write_to(&self, buf: &mut BytesMut) {
        self.mode.write_to(buf);
    }

    fn read_from(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            mode: ControllerMode::read_from(buf)?,
        })
    }
}

/// 设置控制器模式请求（4 字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SetControllerModeRequest {
    pub mode: ControllerMode,
}

impl WirePayload for SetControllerModeRequest {
    const WIRE_LEN: usize = ControllerMode::WIRE_LEN;

    fn write_to(&self, buf: &mut BytesMut) {
        self.mode.write_to(buf);
    }

    fn read_from(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            mode: ControllerMode::read_from(buf)?,
        })
    }
}

// ============================================================================
// 配置请求
// ============================================================================

/// 碰撞行为设置请求（416 字节）
///
/// 四组阈值依次编码：关节力矩（加速阶段 14 个、常规阶段 14 个），
/// 笛卡尔力（加速阶段 12 个、常规阶段 12 个）。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SetCollisionBehaviorRequest {
    pub torque_thresholds_acceleration: [f64; 14],
    pub torque_thresholds_nominal: [f64; 14],
    pub force_thresholds_acceleration: [f64; 12],
    pub force_thresholds_nominal: [f64; 12],
}

impl SetCollisionBehaviorRequest {
    /// 加速阶段与常规阶段使用同一组阈值
    pub fn uniform(torque_thresholds: [f64; 14], force_thresholds: [f64; 12]) -> Self {
        Self {
            torque_thresholds_acceleration: torque_thresholds,
            torque_thresholds_nominal: torque_thresholds,
            force_thresholds_acceleration: force_thresholds,
            force_thresholds_nominal: force_thresholds,
        }
    }

    fn check(&self) -> Result<(), ParameterError> {
        for (field, values) in [
            (
                "torque_thresholds_acceleration",
                &self.torque_thresholds_acceleration[..],
            ),
            ("torque_thresholds_nominal", &self.torque_thresholds_nominal[..]),
            (
                "force_thresholds_acceleration",
                &self.force_thresholds_acceleration[..],
            ),
            ("force_thresholds_nominal", &self.force_thresholds_nominal[..]),
        ] {
            check_finite(field, values)?;
            if values.iter().any(|v| *v < 0.0) {
                return Err(ParameterError {
                    field,
                    reason: "must not be negative",
                });
            }
        }
        Ok(())
    }
}

impl WirePayload for SetCollisionBehaviorRequest {
    const WIRE_LEN: usize = (14 + 14 + 12 + 12) * 8;

    fn write_to(&self, buf: &mut BytesMut) {
        put_f64_array(buf, &self.torque_thresholds_acceleration);
        put_f64_array(buf, &self.torque_thresholds_nominal);
        put_f64_array(buf, &self.force_thresholds_acceleration);
        put_f64_array(buf, &self.force_thresholds_nominal);
    }

    fn read_from(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            torque_thresholds_acceleration: get_f64_array(buf),
            torque_thresholds_nominal: get_f64_array(buf),
            force_thresholds_acceleration: get_f64_array(buf),
            force_thresholds_nominal: get_f64_array(buf),
        })
    }
}

/// 关节阻抗设置请求（7 个关节刚度，56 字节）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SetJointImpedanceRequest {
    pub k_theta: [f64; JOINT_COUNT],
}

impl WirePayload for SetJointImpedanceRequest {
    const WIRE_LEN: usize = JOINT_COUNT * 8;

    fn write_to(&self, buf: &mut BytesMut) {
        put_f64_array(buf, &self.k_theta);
    }

    fn read_from(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            k_theta: get_f64_array(buf),
        })
    }
}

/// 笛卡尔阻抗设置请求（6 个自由度刚度，48 字节）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SetCartesianImpedanceRequest {
    pub k_x: [f64; CARTESIAN_DOF],
}

impl WirePayload for SetCartesianImpedanceRequest {
    const WIRE_LEN: usize = CARTESIAN_DOF * 8;

    fn write_to(&self, buf: &mut BytesMut) {
        put_f64_array(buf, &self.k_x);
    }

    fn read_from(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            k_x: get_f64_array(buf),
        })
    }
}

/// 拖动示教模式设置请求（7 字节）
///
/// `guiding_mode` 依次对应 x, y, z, roll, pitch, yaw 是否允许拖动；
/// `nullspace` 表示是否允许零空间拖动。每个布尔值占 1 字节。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SetGuidingModeRequest {
    pub guiding_mode: [bool; CARTESIAN_DOF],
    pub nullspace: bool,
}

impl WirePayload for SetGuidingModeRequest {
    const WIRE_LEN: usize = CARTESIAN_DOF + 1;

    fn write_to(&self, buf: &mut BytesMut) {
        for axis in self.guiding_mode {
            put_bool(buf, axis);
        }
        put_bool(buf, self.nullspace);
    }

    fn read_from(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        let mut guiding_mode = [false; CARTESIAN_DOF];
        for axis in guiding_mode.iter_mut() {
            *axis = get_bool(buf, "guiding_mode")?;
        }
        Ok(Self {
            guiding_mode,
            nullspace: get_bool(buf, "nullspace")?,
        })
    }
}

/// 末端执行器到刚度坐标系的变换（4x4 列主序，128 字节）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SetEEToKRequest {
    pub ee_t_k: [f64; TRANSFORM_LEN],
}

impl WirePayload for SetEEToKRequest {
    const WIRE_LEN: usize = TRANSFORM_LEN * 8;

    fn write_to(&self, buf: &mut BytesMut) {
        put_f64_array(buf, &self.ee_t_k);
    }

    fn read_from(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            ee_t_k: get_f64_array(buf),
        })
    }
}

/// 法兰到末端执行器的变换（4x4 列主序，128 字节）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SetFToEERequest {
    pub f_t_ee: [f64; TRANSFORM_LEN],
}

impl WirePayload for SetFToEERequest {
    const WIRE_LEN: usize = TRANSFORM_LEN * 8;

    fn write_to(&self, buf: &mut BytesMut) {
        put_f64_array(buf, &self.f_t_ee);
    }

    fn read_from(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            f_t_ee: get_f64_array(buf),
        })
    }
}

/// 负载设置请求（104 字节）
///
/// - `mass`: 负载质量（kg）
/// - `center_of_mass`: 质心在法兰坐标系下的位置（m）
/// - `inertia`: 3x3 惯量矩阵（列主序，kg·m²）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SetLoadRequest {
    pub mass: f64,
    pub center_of_mass: [f64; 3],
    pub inertia: [f64; 9],
}

impl SetLoadRequest {
    fn check(&self) -> Result<(), ParameterError> {
        check_finite("mass", &[self.mass])?;
        check_finite("center_of_mass", &self.center_of_mass)?;
        check_finite("inertia", &self.inertia)?;
        if self.mass < 0.0 {
            return Err(ParameterError {
                field: "mass",
                reason: "must not be negative",
            });
        }
        Ok(())
    }
}

impl WirePayload for SetLoadRequest {
    const WIRE_LEN: usize = (1 + 3 + 9) * 8;

    fn write_to(&self, buf: &mut BytesMut) {
        buf.put_f64_le(self.mass);
        put_f64_array(buf, &self.center_of_mass);
        put_f64_array(buf, &self.inertia);
    }

    fn read_from(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            mass: buf.get_f64_le(),
            center_of_mass: get_f64_array(buf),
            inertia: get_f64_array(buf),
        })
    }
}

/// 时间缩放因子设置请求（8 字节）
///
/// 取值范围 (0, 1]，1 表示不缩放。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SetTimeScalingFactorRequest {
    pub factor: f64,
}

impl WirePayload for SetTimeScalingFactorRequest {
    const WIRE_LEN: usize = 8;

    fn write_to(&self, buf: &mut BytesMut) {
        buf.put_f64_le(self.factor);
    }

    fn read_from(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            factor: buf.get_f64_le(),
        })
    }
}

// ============================================================================
// 请求和类型
// ============================================================================

/// 命令请求
///
/// 17 个命令的封闭和类型，每个变体携带自己的固定布局负载。
/// 没有负载的命令为单元变体。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Request {
    Connect(ConnectRequest),
    StartMotionGenerator(StartMotionGeneratorRequest),
    StopMotionGenerator,
    StartController(StartControllerRequest),
    StopController,
    GetCartesianLimit,
    SetControllerMode(SetControllerModeRequest),
    SetCollisionBehavior(SetCollisionBehaviorRequest),
    SetJointImpedance(SetJointImpedanceRequest),
    SetCartesianImpedance(SetCartesianImpedanceRequest),
    SetGuidingMode(SetGuidingModeRequest),
    SetEEToK(SetEEToKRequest),
    SetFToEE(SetFToEERequest),
    SetLoad(SetLoadRequest),
    SetTimeScalingFactor(SetTimeScalingFactorRequest),
    AutomaticErrorRecovery,
    ResetExternalTorqueAndForceMax,
}

impl Request {
    /// 请求对应的功能 ID
    pub fn function_id(&self) -> FunctionId {
        match self {
            Request::Connect(_) => FunctionId::Connect,
            Request::StartMotionGenerator(_) => FunctionId::StartMotionGenerator,
            Request::StopMotionGenerator => FunctionId::StopMotionGenerator,
            Request::StartController(_) => FunctionId::StartController,
            Request::StopController => FunctionId::StopController,
            Request::GetCartesianLimit => FunctionId::GetCartesianLimit,
            Request::SetControllerMode(_) => FunctionId::SetControllerMode,
            Request::SetCollisionBehavior(_) => FunctionId::SetCollisionBehavior,
            Request::SetJointImpedance(_) => FunctionId::SetJointImpedance,
            Request::SetCartesianImpedance(_) => FunctionId::SetCartesianImpedance,
            Request::SetGuidingMode(_) => FunctionId::SetGuidingMode,
            Request::SetEEToK(_) => FunctionId::SetEEToK,
            Request::SetFToEE(_) => FunctionId::SetFToEE,
            Request::SetLoad(_) => FunctionId::SetLoad,
            Request::SetTimeScalingFactor(_) => FunctionId::SetTimeScalingFactor,
            Request::AutomaticErrorRecovery => FunctionId::AutomaticErrorRecovery,
            Request::ResetExternalTorqueAndForceMax => FunctionId::ResetExternalTorqueAndForceMax,
        }
    }

    /// 检查配置参数
    ///
    /// 非有限数值、负阈值/负质量、超出 (0, 1] 的时间缩放因子均视为非法。
    /// 没有数值参数的命令总是通过。
    pub fn check_parameters(&self) -> Result<(), ParameterError> {
        match self {
            Request::SetCollisionBehavior(req) => req.check(),
            Request::SetJointImpedance(req) => check_finite("k_theta", &req.k_theta),
            Request::SetCartesianImpedance(req) => check_finite("k_x", &req.k_x),
            Request::SetEEToK(req) => check_finite("ee_t_k", &req.ee_t_k),
            Request::SetFToEE(req) => check_finite("f_t_ee", &req.f_t_ee),
            Request::SetLoad(req) => req.check(),
            Request::SetTimeScalingFactor(req) => {
                if req.factor.is_finite() && req.factor > 0.0 && req.factor <= 1.0 {
                    Ok(())
                } else {
                    Err(ParameterError {
                        field: "factor",
                        reason: "must be in (0, 1]",
                    })
                }
            },
            _ => Ok(()),
        }
    }
}
