//! 积木模型
//!
//! 机器由参数化的机械积木组成：
//! - 电机 (Motor)
//! - 平台 (Stage)：直线台、十字台、并联台
//! - 工具 (Tool) 及其安装组件
//! - 平台、构建环境、工作包络等参考积木

use crate::math::{Axis, Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 积木ID（机器内的索引）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub usize);

impl BlockId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 组件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Motor,
    LinearStage,
    CrossStage,
    ParallelStage,
    Tool,
    ToolAssembly,
    Platform,
    BuildEnvironment,
    WorkEnvelope,
}

impl ComponentKind {
    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::Motor => "Motor",
            ComponentKind::LinearStage => "LinearStage",
            ComponentKind::CrossStage => "CrossStage",
            ComponentKind::ParallelStage => "ParallelStage",
            ComponentKind::Tool => "Tool",
            ComponentKind::ToolAssembly => "ToolAssembly",
            ComponentKind::Platform => "Platform",
            ComponentKind::BuildEnvironment => "BuildEnvironment",
            ComponentKind::WorkEnvelope => "WorkEnvelope",
        }
    }

    pub fn is_stage(&self) -> bool {
        matches!(
            self,
            ComponentKind::LinearStage | ComponentKind::CrossStage | ComponentKind::ParallelStage
        )
    }

    /// 末端执行器：运动链的叶子候选
    pub fn is_end_effector(&self) -> bool {
        matches!(self, ComponentKind::Tool | ComponentKind::Platform)
    }
}

/// 积木尺寸
///
/// width/height/length 分别对应世界坐标的 x/y/z。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
    pub length: f64,
    /// 圆柱形区域的半径
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
}

impl Dimensions {
    pub fn new(width: f64, height: f64, length: f64) -> Self {
        Self {
            width,
            height,
            length,
            radius: None,
        }
    }

    pub fn cube(size: f64) -> Self {
        Self::new(size, size, size)
    }

    /// 尺寸向量 (width, height, length)
    pub fn size(&self) -> Vector3 {
        Vector3::new(self.width, self.height, self.length)
    }

    pub fn along(&self, axis: Axis) -> f64 {
        self.size()[axis.index()]
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

/// 传动机构类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum DriveKind {
    #[default]
    TimingBelt,
    Leadscrew,
    Rack,
    Other,
}

/// 传动机构
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveMechanism {
    pub kind: DriveKind,
    /// 每步对应的位移
    pub step_displacement_ratio: f64,
}

impl Default for DriveMechanism {
    fn default() -> Self {
        Self {
            kind: DriveKind::TimingBelt,
            step_displacement_ratio: 1.0,
        }
    }
}

/// 运动学拓扑标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Topology {
    DirectDrive,
    #[serde(alias = "coreXY", alias = "corexy")]
    HBot,
    Parallel,
}

impl Topology {
    pub fn name(&self) -> &'static str {
        match self {
            Topology::DirectDrive => "directDrive",
            Topology::HBot => "hBot",
            Topology::Parallel => "parallel",
        }
    }
}

/// 平台的运动学（按拓扑携带各自的轴与电机）
#[derive(Debug, Clone, PartialEq)]
pub enum StageKinematics {
    /// 单轴单电机
    DirectDrive { axis: Axis, motor: BlockId },
    /// 双轴双电机交叉皮带：motors[0] 为 A 电机，motors[1] 为 B 电机
    HBot { axes: [Axis; 2], motors: [BlockId; 2] },
    /// H-bot 的一个分轴：两个平台共享同一对电机，分别承担和项 (A) 与差项 (B)
    HBotAxis {
        axis: Axis,
        motors: [BlockId; 2],
        term: HBotTerm,
    },
    /// 单轴多电机，指令位移在电机间均分
    Parallel { axis: Axis, motors: Vec<BlockId> },
}

/// H-bot 分轴承担的项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HBotTerm {
    /// A = m0 + m1
    Sum,
    /// B = m0 - m1
    Difference,
}

impl StageKinematics {
    pub fn topology(&self) -> Topology {
        match self {
            StageKinematics::DirectDrive { .. } => Topology::DirectDrive,
            StageKinematics::HBot { .. } | StageKinematics::HBotAxis { .. } => Topology::HBot,
            StageKinematics::Parallel { .. } => Topology::Parallel,
        }
    }

    pub fn motors(&self) -> &[BlockId] {
        match self {
            StageKinematics::DirectDrive { motor, .. } => std::slice::from_ref(motor),
            StageKinematics::HBot { motors, .. } | StageKinematics::HBotAxis { motors, .. } => motors,
            StageKinematics::Parallel { motors, .. } => motors,
        }
    }

    pub fn axes(&self) -> &[Axis] {
        match self {
            StageKinematics::DirectDrive { axis, .. } => std::slice::from_ref(axis),
            StageKinematics::HBot { axes, .. } => axes,
            StageKinematics::HBotAxis { axis, .. } | StageKinematics::Parallel { axis, .. } => {
                std::slice::from_ref(axis)
            }
        }
    }
}

/// 受驱动的平台
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub kinematics: StageKinematics,
    pub drive: DriveMechanism,
}

/// 电机声明的运动学类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum MotorKinematics {
    #[default]
    DirectDrive,
    #[serde(alias = "coreXY", alias = "corexy")]
    HBot,
}

/// 电机
#[derive(Debug, Clone, PartialEq)]
pub struct Motor {
    pub kinematics: MotorKinematics,
    pub invert_steps: bool,
    pub driven_stages: Vec<BlockId>,
    /// H-bot 配对电机
    pub pair: Option<BlockId>,
}

impl Motor {
    /// 步数方向符号
    pub fn sign(&self) -> f64 {
        if self.invert_steps {
            -1.0
        } else {
            1.0
        }
    }
}

/// 积木的功能角色
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    /// 无驱动的刚性积木
    Rigid,
    Stage(Stage),
    Motor(Motor),
}

/// 积木
#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockId,
    pub name: String,
    pub kind: ComponentKind,
    pub dimensions: Dimensions,
    /// 世界坐标位置（积木中心）
    pub position: Point3,
    /// 连接时施加的朝向
    pub rotation: Rotation3,
    /// 是否固定在机器底座上
    pub base_block: bool,
    /// 是否为运动链末端
    pub end_block: bool,
    pub part: Part,
}

impl Block {
    pub fn stage(&self) -> Option<&Stage> {
        match &self.part {
            Part::Stage(stage) => Some(stage),
            _ => None,
        }
    }

    pub fn motor(&self) -> Option<&Motor> {
        match &self.part {
            Part::Motor(motor) => Some(motor),
            _ => None,
        }
    }

    /// 旋转后的半尺寸（世界坐标轴上的投影）
    pub fn half_extents(&self) -> Vector3 {
        self.rotation.matrix().abs() * (self.dimensions.size() / 2.0)
    }
}
