//! 工作包络与零点坐标系
//!
//! - [`Region`]：矩形 / 长方体 / 圆柱形区域（工作包络及其命名子区域）
//! - [`ZeroFrame`]：以工具尖端世界位置为原点的控制坐标系
//! - [`EnvelopeManager`]：世界坐标与控制坐标互相转换，检查目标点是否在包围内

use crate::block::Dimensions;
use crate::error::MotionError;
use crate::machine::Machine;
use crate::math::{Axis, BoundingBox3, Point3, Vector3, EPSILON};
use serde::{Deserialize, Serialize};

/// 区域形状
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeShape {
    Rectangle,
    Box,
    Cylinder,
}

/// 矩形区域在平面轴向上视为无限延伸时使用的尺寸
const UNBOUNDED: f64 = f64::INFINITY;

/// 工作区域
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub shape: EnvelopeShape,
    pub dimensions: Dimensions,
    /// 区域中心（世界坐标）
    pub position: Point3,
}

impl Region {
    pub fn new(
        name: impl Into<String>,
        shape: EnvelopeShape,
        dimensions: Dimensions,
        position: Point3,
    ) -> Self {
        Self {
            name: name.into(),
            shape,
            dimensions,
            position,
        }
    }

    /// 矩形的法向轴（尺寸为零的轴）；多个轴为零时取 x、y、z 中最后一个
    pub fn flat_axis(&self) -> Option<Axis> {
        if self.shape != EnvelopeShape::Rectangle {
            return None;
        }
        Axis::ALL
            .into_iter()
            .rev()
            .find(|axis| self.dimensions.along(*axis).abs() < EPSILON)
    }

    /// 圆柱半径：未声明时取底面宽、长中较小者的一半
    pub fn radius(&self) -> f64 {
        self.dimensions
            .radius
            .unwrap_or_else(|| self.dimensions.width.min(self.dimensions.length) / 2.0)
    }

    /// 包围盒；矩形在法向轴上无限延伸
    pub fn bounding_box(&self) -> BoundingBox3 {
        let mut size = match self.shape {
            EnvelopeShape::Cylinder => {
                let d = self.radius() * 2.0;
                Vector3::new(d, self.dimensions.height, d)
            }
            _ => self.dimensions.size(),
        };
        if let Some(axis) = self.flat_axis() {
            size[axis.index()] = UNBOUNDED;
        }
        BoundingBox3::from_center_and_size(self.position, size)
    }

    /// 检查世界坐标点是否在区域内
    pub fn contains_point(&self, point: &Point3) -> bool {
        match self.shape {
            EnvelopeShape::Box | EnvelopeShape::Rectangle => self.bounding_box().contains(point),
            EnvelopeShape::Cylinder => {
                let offset = point - self.position;
                let half_height = self.dimensions.height / 2.0;
                let radius = self.radius();
                offset.y.abs() <= half_height + EPSILON
                    && offset.x * offset.x + offset.z * offset.z <= radius * radius + EPSILON
            }
        }
    }

    /// 检查包围盒是否与区域相交（按区域包围盒近似）
    pub fn intersects_box(&self, bbox: &BoundingBox3) -> bool {
        self.bounding_box().intersects(bbox)
    }
}

/// 零点坐标系
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZeroFrame {
    /// 控制坐标原点的世界位置
    pub origin: Point3,
}

/// 工作包络与零点管理器
#[derive(Debug, Clone, Default)]
pub struct EnvelopeManager {
    envelope: Option<Region>,
    regions: Vec<Region>,
    zero: Option<ZeroFrame>,
}

impl EnvelopeManager {
    pub fn new(envelope: Option<Region>, regions: Vec<Region>) -> Self {
        Self {
            envelope,
            regions,
            zero: None,
        }
    }

    /// 使用机器声明的包络创建
    pub fn for_machine(machine: &Machine) -> Self {
        Self::new(
            machine.work_envelope().cloned(),
            machine.envelope_regions().to_vec(),
        )
    }

    pub fn envelope(&self) -> Option<&Region> {
        self.envelope.as_ref()
    }

    pub fn zero_frame(&self) -> Option<ZeroFrame> {
        self.zero
    }

    pub fn is_zeroed(&self) -> bool {
        self.zero.is_some()
    }

    /// 工具尖端的世界位置：工具中心向下偏移半个高度，
    /// 矩形包络时投影到包络平面上
    pub fn tool_tip(&self, machine: &Machine) -> Point3 {
        let tool = machine.primary_tool();
        let mut tip = tool.position - Vector3::y() * (tool.half_extents().y);
        if let Some(envelope) = &self.envelope {
            if let Some(axis) = envelope.flat_axis() {
                tip[axis.index()] = envelope.position[axis.index()];
            }
        }
        tip
    }

    /// 以工具当前位置建立零点
    pub fn zero(&mut self, machine: &Machine) -> ZeroFrame {
        let frame = ZeroFrame {
            origin: self.tool_tip(machine),
        };
        tracing::info!(
            "Zeroed at world ({:.3}, {:.3}, {:.3})",
            frame.origin.x,
            frame.origin.y,
            frame.origin.z
        );
        self.zero = Some(frame);
        frame
    }

    /// 以指定世界位置建立零点
    pub fn zero_at(&mut self, origin: Point3) -> ZeroFrame {
        let frame = ZeroFrame { origin };
        self.zero = Some(frame);
        frame
    }

    pub fn reset(&mut self) {
        self.zero = None;
    }

    /// 世界坐标 → 控制坐标
    pub fn to_control_space(&self, world: &Point3) -> Result<Point3, MotionError> {
        let frame = self.zero.ok_or(MotionError::NotZeroed)?;
        Ok(Point3::from(world - frame.origin))
    }

    /// 控制坐标 → 世界坐标
    pub fn to_world_space(&self, control: &Point3) -> Result<Point3, MotionError> {
        let frame = self.zero.ok_or(MotionError::NotZeroed)?;
        Ok(frame.origin + control.coords)
    }

    /// 检查控制坐标点是否在工作包络内；未声明包络时不作限制
    pub fn contains_point(&self, control: &Point3) -> Result<bool, MotionError> {
        let world = self.to_world_space(control)?;
        Ok(self
            .envelope
            .as_ref()
            .map_or(true, |envelope| envelope.contains_point(&world)))
    }

    /// 包含该控制坐标点的所有命名子区域
    pub fn regions_containing(&self, control: &Point3) -> Result<Vec<&Region>, MotionError> {
        let world = self.to_world_space(control)?;
        Ok(self
            .regions
            .iter()
            .filter(|region| region.contains_point(&world))
            .collect())
    }
}
