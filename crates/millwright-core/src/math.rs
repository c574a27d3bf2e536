//! 数学类型定义
//!
//! 基于 nalgebra 的三维类型别名，以及机器坐标轴和轴对齐包围盒。
//! 世界坐标系与渲染器一致：y 轴竖直向上。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 三维点
pub type Point3 = nalgebra::Point3<f64>;

/// 三维向量
pub type Vector3 = nalgebra::Vector3<f64>;

/// 三维旋转
pub type Rotation3 = nalgebra::Rotation3<f64>;

/// 几何比较容差
pub const EPSILON: f64 = 1e-9;

/// 机器坐标轴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// 在向量中的分量索引
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// 单位方向向量
    pub fn unit(self) -> Vector3 {
        match self {
            Axis::X => Vector3::x(),
            Axis::Y => Vector3::y(),
            Axis::Z => Vector3::z(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }

    /// 从字母解析（大小写不敏感），用于 G 代码的坐标字
    pub fn from_letter(letter: char) -> Option<Axis> {
        match letter.to_ascii_lowercase() {
            'x' => Some(Axis::X),
            'y' => Some(Axis::Y),
            'z' => Some(Axis::Z),
            _ => None,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Axis::from_letter(c).ok_or_else(|| format!("Invalid axis: {}", s)),
            _ => Err(format!("Invalid axis: {}", s)),
        }
    }
}

/// 三维轴对齐包围盒
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox3 {
    pub min: Point3,
    pub max: Point3,
}

impl BoundingBox3 {
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// 由中心和尺寸创建
    pub fn from_center_and_size(center: Point3, size: Vector3) -> Self {
        let half = size / 2.0;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn center(&self) -> Point3 {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3 {
        self.max - self.min
    }

    /// 检查点是否在包围盒内（边界包含，带容差）
    pub fn contains(&self, point: &Point3) -> bool {
        (0..3).all(|i| {
            point[i] >= self.min[i] - EPSILON && point[i] <= self.max[i] + EPSILON
        })
    }

    /// 检查两个包围盒是否相交
    pub fn intersects(&self, other: &BoundingBox3) -> bool {
        (0..3).all(|i| self.min[i] <= other.max[i] && self.max[i] >= other.min[i])
    }
}
