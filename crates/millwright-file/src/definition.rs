//! 机器定义文档（JSON）
//!
//! 文档结构：
//! - `motors` / `blocks`：积木，可用 `id` 或 `name` 互相引用
//! - `connections`：面对面连接
//! - `workEnvelope`：工作包络（也可以放在 `references.workEnvelope` 下）
//! - `references.axes`：平台的驱动轴，积木自身未声明 `axes` 时使用
//!
//! 平台的驱动电机取 `drivingMotors` 与电机 `drivenStages` 的并集，
//! H-bot 电机按 `pairMotorType`（a 在前）排序。

use crate::error::FileError;
use millwright_core::block::{ComponentKind, Dimensions, DriveKind, DriveMechanism, MotorKinematics, Topology};
use millwright_core::connection::{ConnectionSpec, End, Face};
use millwright_core::envelope::{EnvelopeShape, Region};
use millwright_core::machine::{BlockSpec, Machine, MachineBuilder, PartSpec};
use millwright_core::math::{Axis, Point3, Rotation3};
use millwright_core::settings::SimulationSettings;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// 三维坐标（也用于以角度表示的旋转）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Xyz {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<Xyz> for Point3 {
    fn from(v: Xyz) -> Self {
        Point3::new(v.x, v.y, v.z)
    }
}

/// 对其他积木的引用
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockRef {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// 数值，或者写成字符串的数值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Value(f64),
    Text(String),
}

impl Number {
    fn value(&self) -> Option<f64> {
        match self {
            Number::Value(v) => Some(*v),
            Number::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildEnvironment {
    pub width: f64,
    pub length: f64,
}

/// 工作包络或命名子区域
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeDefinition {
    #[serde(default)]
    pub name: Option<String>,
    pub shape: EnvelopeShape,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub length: f64,
    #[serde(default)]
    pub radius: Option<f64>,
    #[serde(default)]
    pub position: Xyz,
}

impl EnvelopeDefinition {
    fn to_region(&self, default_name: &str) -> Region {
        let mut dimensions = Dimensions::new(self.width, self.height, self.length);
        dimensions.radius = self.radius;
        Region::new(
            self.name.clone().unwrap_or_else(|| default_name.to_string()),
            self.shape,
            dimensions,
            self.position.into(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotorDefinition {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub dimensions: Dimensions,
    #[serde(default)]
    pub kinematics: MotorKinematics,
    #[serde(default)]
    pub invert_steps: bool,
    #[serde(default)]
    pub driven_stages: Vec<BlockRef>,
    #[serde(default)]
    pub pair_motor_id: Option<String>,
    #[serde(default)]
    pub pair_motor_type: Option<String>,
    #[serde(default)]
    pub position: Option<Xyz>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlockAttributes {
    pub drive_mechanism: DriveKind,
    pub step_displacement_ratio: Option<Number>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDefinition {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub component_type: ComponentKind,
    pub dimensions: Dimensions,
    #[serde(default)]
    pub driving_motors: Vec<BlockRef>,
    #[serde(default)]
    pub axes: Vec<Axis>,
    #[serde(default)]
    pub topology: Option<Topology>,
    #[serde(default)]
    pub attributes: BlockAttributes,
    #[serde(default)]
    pub position: Option<Xyz>,
    /// 欧拉角（度）
    #[serde(default)]
    pub rotation: Option<Xyz>,
    #[serde(default)]
    pub end_block: Option<bool>,
    #[serde(default)]
    pub base_block: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDefinition {
    /// 积木的 id 或名称
    pub base_block: String,
    pub base_block_face: Face,
    #[serde(default)]
    pub base_block_end: End,
    pub add_block: String,
    pub add_block_face: Face,
    #[serde(default)]
    pub add_block_end: End,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct References {
    pub axes: BTreeMap<Axis, Vec<BlockRef>>,
    pub work_envelope: Option<EnvelopeDefinition>,
}

/// 机器定义文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDefinition {
    pub name: String,
    #[serde(default)]
    pub build_environment: Option<BuildEnvironment>,
    #[serde(default)]
    pub work_envelope: Option<EnvelopeDefinition>,
    #[serde(default)]
    pub envelope_regions: Vec<EnvelopeDefinition>,
    #[serde(default)]
    pub motors: Vec<MotorDefinition>,
    #[serde(default)]
    pub blocks: Vec<BlockDefinition>,
    #[serde(default)]
    pub connections: Vec<ConnectionDefinition>,
    #[serde(default)]
    pub references: References,
}

impl MachineDefinition {
    pub fn from_json(text: &str) -> Result<Self, FileError> {
        Ok(serde_json::from_str(text)?)
    }

    /// 转换为机器（包括装配放置与运动学树）
    pub fn to_machine(&self, settings: &SimulationSettings) -> Result<Machine, FileError> {
        let names = self.name_index();
        let resolve = |reference: &str| -> String {
            names
                .get(reference)
                .cloned()
                .unwrap_or_else(|| reference.to_string())
        };
        let resolve_ref = |r: &BlockRef| -> Option<String> {
            r.id.as_deref()
                .map(|id| resolve(id))
                .or_else(|| r.name.clone())
        };

        let mut builder = MachineBuilder::new(self.name.clone());

        for motor in &self.motors {
            let mut spec = BlockSpec::new(motor.name.clone(), ComponentKind::Motor, motor.dimensions).with_part(
                PartSpec::Motor {
                    kinematics: motor.kinematics,
                    invert_steps: motor.invert_steps,
                    pair: motor.pair_motor_id.as_deref().map(|id| resolve(id)),
                },
            );
            if let Some(position) = motor.position {
                spec = spec.at(position.into());
            }
            builder.add_block(spec);
        }

        for block in &self.blocks {
            let motors = self.stage_motors(block, &resolve_ref);
            let part = if block.component_type.is_stage() && !motors.is_empty() {
                let axes = self.stage_axes(block, &resolve_ref);
                if axes.is_empty() {
                    return Err(FileError::InvalidDefinition(format!(
                        "stage '{}' has driving motors but no axis",
                        block.name
                    )));
                }
                PartSpec::Stage {
                    axes,
                    motors,
                    topology: block.topology,
                    drive: DriveMechanism {
                        kind: block.attributes.drive_mechanism,
                        step_displacement_ratio: self.step_ratio(block, settings)?,
                    },
                }
            } else {
                PartSpec::Rigid
            };

            let mut spec = BlockSpec::new(block.name.clone(), block.component_type, block.dimensions).with_part(part);
            spec.end_block = block.end_block;
            spec.base_block = block.base_block;
            if let Some(position) = block.position {
                spec = spec.at(position.into());
            }
            if let Some(r) = block.rotation {
                spec = spec.rotated(Rotation3::from_euler_angles(
                    r.x.to_radians(),
                    r.y.to_radians(),
                    r.z.to_radians(),
                ));
            }
            builder.add_block(spec);
        }

        for conn in &self.connections {
            builder.add_connection(
                ConnectionSpec::new(
                    resolve(&conn.base_block),
                    conn.base_block_face,
                    resolve(&conn.add_block),
                    conn.add_block_face,
                )
                .with_ends(conn.base_block_end, conn.add_block_end),
            );
        }

        let envelope = self
            .work_envelope
            .as_ref()
            .or(self.references.work_envelope.as_ref())
            .map(|e| e.to_region("workEnvelope"));
        builder.set_work_envelope(envelope);
        for (index, region) in self.envelope_regions.iter().enumerate() {
            builder.add_envelope_region(region.to_region(&format!("region {}", index + 1)));
        }

        Ok(builder.build()?)
    }

    /// id → 名称
    fn name_index(&self) -> HashMap<String, String> {
        let motors = self.motors.iter().map(|m| (&m.id, &m.name));
        let blocks = self.blocks.iter().map(|b| (&b.id, &b.name));
        motors
            .chain(blocks)
            .filter_map(|(id, name)| id.as_ref().map(|id| (id.clone(), name.clone())))
            .collect()
    }

    fn refers_to(block: &BlockDefinition, r: &BlockRef) -> bool {
        (r.id.is_some() && r.id == block.id) || r.name.as_deref() == Some(block.name.as_str())
    }

    fn stage_motors(&self, block: &BlockDefinition, resolve_ref: &impl Fn(&BlockRef) -> Option<String>) -> Vec<String> {
        let mut motors: Vec<String> = block.driving_motors.iter().filter_map(resolve_ref).collect();
        for motor in &self.motors {
            let drives = motor
                .driven_stages
                .iter()
                .any(|r| Self::refers_to(block, r));
            if drives && !motors.contains(&motor.name) {
                motors.push(motor.name.clone());
            }
        }

        let pair_rank = |name: &String| {
            self.motors
                .iter()
                .find(|m| &m.name == name)
                .and_then(|m| m.pair_motor_type.as_deref())
                .map_or(2, |t| if t.eq_ignore_ascii_case("a") { 0 } else { 1 })
        };
        motors.sort_by_key(pair_rank);
        motors
    }

    fn stage_axes(&self, block: &BlockDefinition, resolve_ref: &impl Fn(&BlockRef) -> Option<String>) -> Vec<Axis> {
        if !block.axes.is_empty() {
            return block.axes.clone();
        }
        self.references
            .axes
            .iter()
            .filter(|(_, refs)| {
                refs.iter()
                    .any(|r| Self::refers_to(block, r) || resolve_ref(r).as_deref() == Some(block.name.as_str()))
            })
            .map(|(axis, _)| *axis)
            .collect()
    }

    fn step_ratio(&self, block: &BlockDefinition, settings: &SimulationSettings) -> Result<f64, FileError> {
        match &block.attributes.step_displacement_ratio {
            None => Ok(settings.default_step_ratio),
            Some(number) => number.value().ok_or_else(|| {
                FileError::InvalidDefinition(format!(
                    "stage '{}' has a non-numeric step displacement ratio: {:?}",
                    block.name, number
                ))
            }),
        }
    }
}

/// 读取机器定义文件并构建机器
pub fn load_machine(path: &Path, settings: &SimulationSettings) -> Result<Machine, FileError> {
    let text = std::fs::read_to_string(path)?;
    let definition = MachineDefinition::from_json(&text)?;
    let machine = definition.to_machine(settings)?;
    tracing::info!("Loaded machine definition {}", path.display());
    Ok(machine)
}
