//! 功能 ID 定义
//!
//! 每个命令在线上由一个 `u32` 功能 ID 标识，请求与响应的帧头都以它开头。
//! 取值一经分配不再改变，跨协议版本保持稳定。

use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// 协议版本号（连接时精确比较）
pub type ProtocolVersion = u16;

/// 功能 ID（17 个命令的封闭枚举）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum FunctionId {
    Connect = 0,
    StartMotionGenerator = 1,
    StopMotionGenerator = 2,
    StartController = 3,
    StopController = 4,
    GetCartesianLimit = 5,
    SetControllerMode = 6,
    SetCollisionBehavior = 7,
    SetJointImpedance = 8,
    SetCartesianImpedance = 9,
    SetGuidingMode = 10,
    SetEEToK = 11,
    SetFToEE = 12,
    SetLoad = 13,
    SetTimeScalingFactor = 14,
    AutomaticErrorRecovery = 15,
    ResetExternalTorqueAndForceMax = 16,
}

impl FunctionId {
    /// 命令总数
    pub const COUNT: usize = 17;

    /// 按线上取值顺序排列的全部功能 ID
    pub const ALL: [FunctionId; Self::COUNT] = [
        FunctionId::Connect,
        FunctionId::StartMotionGenerator,
        FunctionId::StopMotionGenerator,
        FunctionId::StartController,
        FunctionId::StopController,
        FunctionId::GetCartesianLimit,
        FunctionId::SetControllerMode,
        FunctionId::SetCollisionBehavior,
        FunctionId::SetJointImpedance,
        FunctionId::SetCartesianImpedance,
        FunctionId::SetGuidingMode,
        FunctionId::SetEEToK,
        FunctionId::SetFToEE,
        FunctionId::SetLoad,
        FunctionId::SetTimeScalingFactor,
        FunctionId::AutomaticErrorRecovery,
        FunctionId::ResetExternalTorqueAndForceMax,
    ];

    /// 线上取值
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// 是否为配置类命令
    ///
    /// 配置类命令只修改实时环使用的参数，不改变控制器/运动生成器两个轴的状态。
    pub const fn is_configuration(self) -> bool {
        matches!(
            self,
            FunctionId::GetCartesianLimit
                | FunctionId::SetControllerMode
                | FunctionId::SetCollisionBehavior
                | FunctionId::SetJointImpedance
                | FunctionId::SetCartesianImpedance
                | FunctionId::SetGuidingMode
                | FunctionId::SetEEToK
                | FunctionId::SetFToEE
                | FunctionId::SetLoad
                | FunctionId::SetTimeScalingFactor
                | FunctionId::ResetExternalTorqueAndForceMax
        )
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// 功能 ID 集合（位集，按线上取值排序迭代）
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FunctionSet(u32);

impl FunctionSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    const fn bit(function: FunctionId) -> u32 {
        1 << function.as_u32()
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn contains(self, function: FunctionId) -> bool {
        self.0 & Self::bit(function) != 0
    }

    /// 插入，返回此前是否不存在
    pub fn insert(&mut self, function: FunctionId) -> bool {
        let absent = !self.contains(function);
        self.0 |= Self::bit(function);
        absent
    }

    pub fn remove(&mut self, function: FunctionId) -> bool {
        let present = self.contains(function);
        self.0 &= !Self::bit(function);
        present
    }

    /// 仅保留满足条件的元素
    pub fn retain(&mut self, mut keep: impl FnMut(FunctionId) -> bool) {
        for function in self.iter() {
            if !keep(function) {
                self.remove(function);
            }
        }
    }

    pub fn iter(self) -> impl Iterator<Item = FunctionId> {
        FunctionId::ALL
            .into_iter()
            .filter(move |function| self.contains(*function))
    }
}

impl FromIterator<FunctionId> for FunctionSet {
    fn from_iter<I: IntoIterator<Item = FunctionId>>(iter: I) -> Self {
        let mut set = Self::empty();
        for function in iter {
            set.insert(function);
        }
        set
    }
}

impl fmt::Debug for FunctionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
