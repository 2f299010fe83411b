//! 安全违规词汇表与故障分类
//!
//! 实时环以 64 位标志字上报故障（[`RawSafetyFlags`]），位 0..=32 对应
//! [`SafetyViolation`] 的 33 个具名条目，位 33..=63 保留。
//! [`classify`] 将标志字映射为去重后的 [`SafetyViolationSet`]，附加在
//! 运动中止通知上，仅用于说明中止原因，不参与状态迁移决策。

use bilge::prelude::*;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use tracing::warn;

/// 安全违规类型
///
/// 取值即其在原始标志字中的位序号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum SafetyViolation {
    JointPositionLimitsViolation = 0,
    CartesianPositionLimitsViolation = 1,
    SelfcollisionAvoidanceViolation = 2,
    JointVelocityViolation = 3,
    CartesianVelocityViolation = 4,
    ForceControlSafetyViolation = 5,
    JointReflex = 6,
    CartesianReflex = 7,
    MaxGoalPoseDeviationViolation = 8,
    MaxPathPoseDeviationViolation = 9,
    CartesianVelocityProfileSafetyViolation = 10,
    JointPositionMotionGeneratorStartPoseInvalid = 11,
    JointMotionGeneratorPositionLimitsViolation = 12,
    JointMotionGeneratorVelocityLimitsViolation = 13,
    JointMotionGeneratorVelocityDiscontinuity = 14,
    JointMotionGeneratorAccelerationDiscontinuity = 15,
    CartesianPositionMotionGeneratorStartPoseInvalid = 16,
    CartesianMotionGeneratorElbowLimitViolation = 17,
    CartesianMotionGeneratorVelocityLimitsViolation = 18,
    CartesianMotionGeneratorVelocityDiscontinuity = 19,
    CartesianMotionGeneratorAccelerationDiscontinuity = 20,
    CartesianMotionGeneratorElbowSignInconsistent = 21,
    CartesianMotionGeneratorStartElbowInvalid = 22,
    ForceControllerDesiredForceToleranceViolation = 23,
    StartElbowSignInconsistent = 24,
    CommunicationConstraintsViolation = 25,
    PowerLimitViolation = 26,
    CartesianMotionGeneratorJointPositionLimitsViolation = 27,
    CartesianMotionGeneratorJointVelocityLimitsViolation = 28,
    CartesianMotionGeneratorJointVelocityDiscontinuity = 29,
    CartesianMotionGeneratorJointAccelerationDiscontinuity = 30,
    CartesianPositionMotionGeneratorInvalidFrame = 31,
    ControllerTorqueDiscontinuity = 32,
}

impl SafetyViolation {
    /// 词汇表条目数
    pub const COUNT: usize = 33;

    /// 是否为反射（碰撞检测触发）
    pub fn is_reflex(self) -> bool {
        matches!(self, SafetyViolation::JointReflex | SafetyViolation::CartesianReflex)
    }

    fn bit(self) -> u64 {
        1u64 << u8::from(self)
    }
}

impl fmt::Display for SafetyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// 实时环上报的原始故障标志字（64 位）
///
/// bilge 默认 LSB first，字段顺序即位序号。
#[bitsize(64)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq)]
pub struct RawSafetyFlags {
    pub joint_position_limits_violation: bool,
    pub cartesian_position_limits_violation: bool,
    pub selfcollision_avoidance_violation: bool,
    pub joint_velocity_violation: bool,
    pub cartesian_velocity_violation: bool,
    pub force_control_safety_violation: bool,
    pub joint_reflex: bool,
    pub cartesian_reflex: bool,
    pub max_goal_pose_deviation_violation: bool,
    pub max_path_pose_deviation_violation: bool,
    pub cartesian_velocity_profile_safety_violation: bool,
    pub joint_position_motion_generator_start_pose_invalid: bool,
    pub joint_motion_generator_position_limits_violation: bool,
    pub joint_motion_generator_velocity_limits_violation: bool,
    pub joint_motion_generator_velocity_discontinuity: bool,
    pub joint_motion_generator_acceleration_discontinuity: bool,
    pub cartesian_position_motion_generator_start_pose_invalid: bool,
    pub cartesian_motion_generator_elbow_limit_violation: bool,
    pub cartesian_motion_generator_velocity_limits_violation: bool,
    pub cartesian_motion_generator_velocity_discontinuity: bool,
    pub cartesian_motion_generator_acceleration_discontinuity: bool,
    pub cartesian_motion_generator_elbow_sign_inconsistent: bool,
    pub cartesian_motion_generator_start_elbow_invalid: bool,
    pub force_controller_desired_force_tolerance_violation: bool,
    pub start_elbow_sign_inconsistent: bool,
    pub communication_constraints_violation: bool,
    pub power_limit_violation: bool,
    pub cartesian_motion_generator_joint_position_limits_violation: bool,
    pub cartesian_motion_generator_joint_velocity_limits_violation: bool,
    pub cartesian_motion_generator_joint_velocity_discontinuity: bool,
    pub cartesian_motion_generator_joint_acceleration_discontinuity: bool,
    pub cartesian_position_motion_generator_invalid_frame: bool,
    pub controller_torque_discontinuity: bool,
    pub reserved: u31,
}

impl RawSafetyFlags {
    const NAMED_MASK: u64 = (1u64 << SafetyViolation::COUNT) - 1;

    /// 原始位值
    pub fn bits(self) -> u64 {
        u64::from(self)
    }

    /// 保留位（33..=63）是否有置位
    pub fn has_reserved_bits(self) -> bool {
        self.bits() & !Self::NAMED_MASK != 0
    }
}

impl From<[bool; SafetyViolation::COUNT]> for RawSafetyFlags {
    /// 由实时状态中的布尔数组构建（下标即位序号）
    fn from(flags: [bool; SafetyViolation::COUNT]) -> Self {
        let bits = flags
            .iter()
            .enumerate()
            .filter(|(_, set)| **set)
            .fold(0u64, |acc, (index, _)| acc | (1u64 << index));
        RawSafetyFlags::from(bits)
    }
}

type FlagGetter = fn(&RawSafetyFlags) -> bool;

/// 分类表：具名字段 → 词汇表条目（顺序即位序号）
const CLASSIFICATION: [(FlagGetter, SafetyViolation); SafetyViolation::COUNT] = [
    (RawSafetyFlags::joint_position_limits_violation, SafetyViolation::JointPositionLimitsViolation),
    (RawSafetyFlags::cartesian_position_limits_violation, SafetyViolation::CartesianPositionLimitsViolation),
    (RawSafetyFlags::selfcollision_avoidance_violation, SafetyViolation::SelfcollisionAvoidanceViolation),
    (RawSafetyFlags::joint_velocity_violation, SafetyViolation::JointVelocityViolation),
    (RawSafetyFlags::cartesian_velocity_violation, SafetyViolation::CartesianVelocityViolation),
    (RawSafetyFlags::force_control_safety_violation, SafetyViolation::ForceControlSafetyViolation),
    (RawSafetyFlags::joint_reflex, SafetyViolation::JointReflex),
    (RawSafetyFlags::cartesian_reflex, SafetyViolation::CartesianReflex),
    (RawSafetyFlags::max_goal_pose_deviation_violation, SafetyViolation::MaxGoalPoseDeviationViolation),
    (RawSafetyFlags::max_path_pose_deviation_violation, SafetyViolation::MaxPathPoseDeviationViolation),
    (RawSafetyFlags::cartesian_velocity_profile_safety_violation, SafetyViolation::CartesianVelocityProfileSafetyViolation),
    (RawSafetyFlags::joint_position_motion_generator_start_pose_invalid, SafetyViolation::JointPositionMotionGeneratorStartPoseInvalid),
    (RawSafetyFlags::joint_motion_generator_position_limits_violation, SafetyViolation::JointMotionGeneratorPositionLimitsViolation),
    (RawSafetyFlags::joint_motion_generator_velocity_limits_violation, SafetyViolation::JointMotionGeneratorVelocityLimitsViolation),
    (RawSafetyFlags::joint_motion_generator_velocity_discontinuity, SafetyViolation::JointMotionGeneratorVelocityDiscontinuity),
    (RawSafetyFlags::joint_motion_generator_acceleration_discontinuity, SafetyViolation::JointMotionGeneratorAccelerationDiscontinuity),
    (RawSafetyFlags::cartesian_position_motion_generator_start_pose_invalid, SafetyViolation::CartesianPositionMotionGeneratorStartPoseInvalid),
    (RawSafetyFlags::cartesian_motion_generator_elbow_limit_violation, SafetyViolation::CartesianMotionGeneratorElbowLimitViolation),
    (RawSafetyFlags::cartesian_motion_generator_velocity_limits_violation, SafetyViolation::CartesianMotionGeneratorVelocityLimitsViolation),
    (RawSafetyFlags::cartesian_motion_generator_velocity_discontinuity, SafetyViolation::CartesianMotionGeneratorVelocityDiscontinuity),
    (RawSafetyFlags::cartesian_motion_generator_acceleration_discontinuity, SafetyViolation::CartesianMotionGeneratorAccelerationDiscontinuity),
    (RawSafetyFlags::cartesian_motion_generator_elbow_sign_inconsistent, SafetyViolation::CartesianMotionGeneratorElbowSignInconsistent),
    (RawSafetyFlags::cartesian_motion_generator_start_elbow_invalid, SafetyViolation::CartesianMotionGeneratorStartElbowInvalid),
    (RawSafetyFlags::force_controller_desired_force_tolerance_violation, SafetyViolation::ForceControllerDesiredForceToleranceViolation),
    (RawSafetyFlags::start_elbow_sign_inconsistent, SafetyViolation::StartElbowSignInconsistent),
    (RawSafetyFlags::communication_constraints_violation, SafetyViolation::CommunicationConstraintsViolation),
    (RawSafetyFlags::power_limit_violation, SafetyViolation::PowerLimitViolation),
    (RawSafetyFlags::cartesian_motion_generator_joint_position_limits_violation, SafetyViolation::CartesianMotionGeneratorJointPositionLimitsViolation),
    (RawSafetyFlags::cartesian_motion_generator_joint_velocity_limits_violation, SafetyViolation::CartesianMotionGeneratorJointVelocityLimitsViolation),
    (RawSafetyFlags::cartesian_motion_generator_joint_velocity_discontinuity, SafetyViolation::CartesianMotionGeneratorJointVelocityDiscontinuity),
    (RawSafetyFlags::cartesian_motion_generator_joint_acceleration_discontinuity, SafetyViolation::CartesianMotionGeneratorJointAccelerationDiscontinuity),
    (RawSafetyFlags::cartesian_position_motion_generator_invalid_frame, SafetyViolation::CartesianPositionMotionGeneratorInvalidFrame),
    (RawSafetyFlags::controller_torque_discontinuity, SafetyViolation::ControllerTorqueDiscontinuity),
];

/// 安全违规集合
///
/// 以位集表示，天然去重；迭代顺序为词汇表顺序。
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SafetyViolationSet(u64);

impl SafetyViolationSet {
    /// 空集合
    pub const fn empty() -> Self {
        Self(0)
    }

    /// 由位值构建，丢弃保留位
    pub fn from_bits_truncate(bits: u64) -> Self {
        Self(bits & RawSafetyFlags::NAMED_MASK)
    }

    /// 位值
    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn contains(self, violation: SafetyViolation) -> bool {
        self.0 & violation.bit() != 0
    }

    /// 插入，返回此前是否不存在
    pub fn insert(&mut self, violation: SafetyViolation) -> bool {
        let absent = !self.contains(violation);
        self.0 |= violation.bit();
        absent
    }

    pub fn remove(&mut self, violation: SafetyViolation) -> bool {
        let present = self.contains(violation);
        self.0 &= !violation.bit();
        present
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// 是否包含反射类违规
    pub fn has_reflex(self) -> bool {
        self.iter().any(SafetyViolation::is_reflex)
    }

    pub fn iter(self) -> impl Iterator<Item = SafetyViolation> {
        (0..SafetyViolation::COUNT as u8)
            .filter_map(|bit| SafetyViolation::try_from(bit).ok())
            .filter(move |violation| self.contains(*violation))
    }
}

impl FromIterator<SafetyViolation> for SafetyViolationSet {
    fn from_iter<I: IntoIterator<Item = SafetyViolation>>(iter: I) -> Self {
        let mut set = Self::empty();
        for violation in iter {
            set.insert(violation);
        }
        set
    }
}

impl fmt::Debug for SafetyViolationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for SafetyViolationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        for (index, violation) in self.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

/// 故障分类
///
/// 将实时环的原始标志字映射为具名违规集合。保留位置位时记录告警并忽略。
pub fn classify(raw: RawSafetyFlags) -> SafetyViolationSet {
    if raw.has_reserved_bits() {
        warn!(bits = raw.bits(), "reserved safety flag bits set, ignoring");
    }
    CLASSIFICATION
        .iter()
        .filter(|(is_set, _)| is_set(&raw))
        .map(|(_, violation)| *violation)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table_matches_bit_positions() {
        for (index, (_, violation)) in CLASSIFICATION.iter().enumerate() {
            assert_eq!(u8::from(*violation) as usize, index);
        }
    }

    #[test]
    fn test_each_named_bit_maps_to_one_violation() {
        for bit in 0..SafetyViolation::COUNT {
            let raw = RawSafetyFlags::from(1u64 << bit);
            let set = classify(raw);
            assert_eq!(set.len(), 1, "bit {bit}");
            let violation = SafetyViolation::try_from(bit as u8).unwrap();
            assert!(set.contains(violation));
        }
    }

    #[test]
    fn test_bilge_field_order() {
        let raw = RawSafetyFlags::from(1u64 << 6);
        assert!(raw.joint_reflex());
        assert!(!raw.cartesian_reflex());

        let raw = RawSafetyFlags::from(1u64 << 32);
        assert!(raw.controller_torque_discontinuity());
    }

    #[test]
    fn test_classify_co_occurring_flags() {
        let mut flags = [false; SafetyViolation::COUNT];
        flags[SafetyViolation::CartesianVelocityViolation as usize] = true;
        flags[SafetyViolation::CartesianReflex as usize] = true;
        let set = classify(RawSafetyFlags::from(flags));
        assert_eq!(set.len(), 2);
        assert!(set.contains(SafetyViolation::CartesianVelocityViolation));
        assert!(set.contains(SafetyViolation::CartesianReflex));
        assert!(set.has_reflex());
    }

    #[test]
    fn test_classify_empty() {
        assert!(classify(RawSafetyFlags::from(0u64)).is_empty());
    }

    #[test]
    fn test_classify_ignores_reserved_bits() {
        let raw = RawSafetyFlags::from((1u64 << 40) | (1u64 << 63) | 1);
        assert!(raw.has_reserved_bits());
        let set = classify(raw);
        assert_eq!(set.len(), 1);
        assert!(set.contains(SafetyViolation::JointPositionLimitsViolation));
    }

    #[test]
    fn test_set_operations() {
        let mut set = SafetyViolationSet::empty();
        assert!(set.insert(SafetyViolation::PowerLimitViolation));
        assert!(!set.insert(SafetyViolation::PowerLimitViolation));
        assert_eq!(set.len(), 1);

        let other: SafetyViolationSet = [SafetyViolation::JointReflex].into_iter().collect();
        let merged = set.union(other);
        assert_eq!(merged.len(), 2);
        assert_eq!(
            merged.iter().collect::<Vec<_>>(),
            vec![SafetyViolation::JointReflex, SafetyViolation::PowerLimitViolation]
        );

        assert!(set.remove(SafetyViolation::PowerLimitViolation));
        assert!(set.is_empty());
    }

    #[test]
    fn test_from_bits_truncate_drops_reserved() {
        let set = SafetyViolationSet::from_bits_truncate(u64::MAX);
        assert_eq!(set.len(), SafetyViolation::COUNT);
    }

    #[test]
    fn test_display() {
        assert_eq!(SafetyViolationSet::empty().to_string(), "none");
        let set: SafetyViolationSet = [SafetyViolation::JointReflex, SafetyViolation::CartesianReflex]
            .into_iter()
            .collect();
        assert_eq!(set.to_string(), "JointReflex, CartesianReflex");
    }
}
