//! 机器装配
//!
//! [`MachineBuilder`] 收集按名称描述的积木与连接，在 `build` 时：
//! 1. 分配积木ID并检查重名
//! 2. 解析连接并检查重复固定
//! 3. 推导 baseBlock / endBlock 标志
//! 4. 解析平台拓扑与电机引用
//! 5. 按面对面连接放置积木
//! 6. 构建运动学森林
//!
//! 得到的 [`Machine`] 是一次机器加载的不可变快照（积木位置除外）。

use crate::assembly;
use crate::block::{
    Block, BlockId, ComponentKind, Dimensions, DriveMechanism, HBotTerm, Motor, MotorKinematics,
    Part, Stage, StageKinematics, Topology,
};
use crate::connection::{Connection, ConnectionSpec};
use crate::envelope::Region;
use crate::error::ConfigurationError;
use crate::math::{Axis, Point3, Rotation3};
use crate::tree::{build_tree, KinematicForest};
use std::collections::{HashMap, HashSet};

/// 积木的驱动描述
#[derive(Debug, Clone, PartialEq)]
pub enum PartSpec {
    Rigid,
    Stage {
        axes: Vec<Axis>,
        motors: Vec<String>,
        topology: Option<Topology>,
        drive: DriveMechanism,
    },
    Motor {
        kinematics: MotorKinematics,
        invert_steps: bool,
        pair: Option<String>,
    },
}

/// 按名称描述的积木
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSpec {
    pub name: String,
    pub kind: ComponentKind,
    pub dimensions: Dimensions,
    /// 显式位置；缺省时由连接推导
    pub position: Option<Point3>,
    pub rotation: Rotation3,
    pub end_block: Option<bool>,
    pub base_block: Option<bool>,
    pub part: PartSpec,
}

impl BlockSpec {
    pub fn new(name: impl Into<String>, kind: ComponentKind, dimensions: Dimensions) -> Self {
        Self {
            name: name.into(),
            kind,
            dimensions,
            position: None,
            rotation: Rotation3::identity(),
            end_block: None,
            base_block: None,
            part: PartSpec::Rigid,
        }
    }

    /// 直驱电机
    pub fn motor(name: impl Into<String>, dimensions: Dimensions) -> Self {
        Self::new(name, ComponentKind::Motor, dimensions).with_part(PartSpec::Motor {
            kinematics: MotorKinematics::DirectDrive,
            invert_steps: false,
            pair: None,
        })
    }

    /// 单轴直线台
    pub fn linear_stage(
        name: impl Into<String>,
        dimensions: Dimensions,
        axis: Axis,
        motors: &[&str],
    ) -> Self {
        Self::new(name, ComponentKind::LinearStage, dimensions).with_part(PartSpec::Stage {
            axes: vec![axis],
            motors: motors.iter().map(|m| m.to_string()).collect(),
            topology: None,
            drive: DriveMechanism::default(),
        })
    }

    pub fn at(mut self, position: Point3) -> Self {
        self.position = Some(position);
        self
    }

    pub fn rotated(mut self, rotation: Rotation3) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_part(mut self, part: PartSpec) -> Self {
        self.part = part;
        self
    }

    pub fn end_block(mut self, end_block: bool) -> Self {
        self.end_block = Some(end_block);
        self
    }

    /// 设置电机反向（仅对电机有效）
    pub fn inverted(mut self) -> Self {
        if let PartSpec::Motor { invert_steps, .. } = &mut self.part {
            *invert_steps = true;
        }
        self
    }
}

/// 机器构建器
#[derive(Debug, Clone, Default)]
pub struct MachineBuilder {
    name: String,
    blocks: Vec<BlockSpec>,
    connections: Vec<ConnectionSpec>,
    envelope: Option<Region>,
    regions: Vec<Region>,
}

impl MachineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn block(mut self, spec: BlockSpec) -> Self {
        self.blocks.push(spec);
        self
    }

    pub fn connect(mut self, spec: ConnectionSpec) -> Self {
        self.connections.push(spec);
        self
    }

    pub fn work_envelope(mut self, region: Region) -> Self {
        self.envelope = Some(region);
        self
    }

    pub fn envelope_region(mut self, region: Region) -> Self {
        self.regions.push(region);
        self
    }

    pub fn add_block(&mut self, spec: BlockSpec) -> &mut Self {
        self.blocks.push(spec);
        self
    }

    pub fn add_connection(&mut self, spec: ConnectionSpec) -> &mut Self {
        self.connections.push(spec);
        self
    }

    pub fn set_work_envelope(&mut self, region: Option<Region>) -> &mut Self {
        self.envelope = region;
        self
    }

    pub fn add_envelope_region(&mut self, region: Region) -> &mut Self {
        self.regions.push(region);
        self
    }

    /// 构建机器
    pub fn build(self) -> Result<Machine, ConfigurationError> {
        let mut by_name: HashMap<String, BlockId> = HashMap::new();
        for (index, spec) in self.blocks.iter().enumerate() {
            if by_name.insert(spec.name.clone(), BlockId(index)).is_some() {
                return Err(ConfigurationError::DuplicateBlock(spec.name.clone()));
            }
        }

        let lookup = |name: &str, context: &str| -> Result<BlockId, ConfigurationError> {
            by_name
                .get(name)
                .copied()
                .ok_or_else(|| ConfigurationError::UnknownBlock {
                    name: name.to_string(),
                    context: context.to_string(),
                })
        };

        let connections = resolve_connections(&self.connections, &lookup)?;

        let bases: HashSet<BlockId> = connections.iter().map(|c| c.base).collect();
        let adds: HashSet<BlockId> = connections.iter().map(|c| c.add).collect();

        // 先创建刚性积木，再填充平台与电机
        let mut blocks: Vec<Block> = self
            .blocks
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                let id = BlockId(index);
                Block {
                    id,
                    name: spec.name.clone(),
                    kind: spec.kind,
                    dimensions: spec.dimensions,
                    position: spec.position.unwrap_or_else(Point3::origin),
                    rotation: spec.rotation,
                    base_block: spec.base_block.unwrap_or(!adds.contains(&id)),
                    end_block: spec
                        .end_block
                        .unwrap_or(spec.kind.is_end_effector() && !bases.contains(&id)),
                    part: Part::Rigid,
                }
            })
            .collect();

        let mut driven: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
        for (index, spec) in self.blocks.iter().enumerate() {
            let PartSpec::Stage {
                axes,
                motors,
                topology,
                drive,
            } = &spec.part
            else {
                continue;
            };
            let context = format!("stage '{}'", spec.name);
            let motor_ids = motors
                .iter()
                .map(|m| lookup(m.as_str(), context.as_str()))
                .collect::<Result<Vec<_>, _>>()?;
            for &motor_id in &motor_ids {
                if !matches!(self.blocks[motor_id.0].part, PartSpec::Motor { .. }) {
                    return Err(ConfigurationError::NotAMotor(self.blocks[motor_id.0].name.clone()));
                }
                driven.entry(motor_id).or_default().push(BlockId(index));
            }
            if motor_ids.is_empty() {
                continue;
            }
            let topology = topology.unwrap_or_else(|| infer_topology(spec, &motor_ids, &self.blocks));
            let kinematics = stage_kinematics(&spec.name, topology, axes, &motor_ids)?;
            if drive.step_displacement_ratio <= 0.0 || !drive.step_displacement_ratio.is_finite() {
                return Err(ConfigurationError::InvalidStage {
                    stage: spec.name.clone(),
                    reason: format!(
                        "step displacement ratio must be positive, got {}",
                        drive.step_displacement_ratio
                    ),
                });
            }
            blocks[index].part = Part::Stage(Stage {
                kinematics,
                drive: *drive,
            });
        }
        assign_hbot_terms(&mut blocks);

        for (index, spec) in self.blocks.iter().enumerate() {
            let PartSpec::Motor {
                kinematics,
                invert_steps,
                pair,
            } = &spec.part
            else {
                continue;
            };
            let id = BlockId(index);
            let pair = match pair {
                Some(name) => Some(lookup(name.as_str(), format!("motor '{}'", spec.name).as_str())?),
                None => hbot_partner(&blocks, id),
            };
            blocks[index].part = Part::Motor(Motor {
                kinematics: *kinematics,
                invert_steps: *invert_steps,
                driven_stages: driven.remove(&id).unwrap_or_default(),
                pair,
            });
        }

        let placed: Vec<bool> = self.blocks.iter().map(|s| s.position.is_some()).collect();
        assembly::assemble(&mut blocks, &connections, placed);

        let forest = build_tree(&blocks, &connections)?;

        tracing::info!(
            "Loaded machine '{}': {} blocks, {} connections, {} kinematic chains",
            self.name,
            blocks.len(),
            connections.len(),
            forest.roots().len()
        );

        Ok(Machine {
            name: self.name,
            blocks,
            by_name,
            connections,
            envelope: self.envelope,
            regions: self.regions,
            forest,
        })
    }
}

fn resolve_connections(
    specs: &[ConnectionSpec],
    lookup: &impl Fn(&str, &str) -> Result<BlockId, ConfigurationError>,
) -> Result<Vec<Connection>, ConfigurationError> {
    let mut attachments = HashSet::new();
    let mut pairs = HashSet::new();
    let mut connections = Vec::with_capacity(specs.len());

    for spec in specs {
        let context = format!("connection {} -> {}", spec.base_block, spec.add_block);
        let base = lookup(spec.base_block.as_str(), context.as_str())?;
        let add = lookup(spec.add_block.as_str(), context.as_str())?;
        if base == add {
            return Err(ConfigurationError::SelfConnection(spec.base_block.clone()));
        }

        // 同一附加积木的同一个固定点只能固定一次；不同固定点连到不同基础积木则是并联机构
        let duplicate = !attachments.insert((add, spec.add_block_face, spec.add_block_end))
            || !pairs.insert((base, add));
        if duplicate {
            return Err(ConfigurationError::DuplicateAttachment {
                add: spec.add_block.clone(),
                face: spec.add_block_face.to_string(),
                end: spec.add_block_end.to_string(),
            });
        }

        connections.push(Connection {
            base,
            base_face: spec.base_block_face,
            base_end: spec.base_block_end,
            add,
            add_face: spec.add_block_face,
            add_end: spec.add_block_end,
        });
    }

    Ok(connections)
}

/// 未显式声明时推导平台拓扑
fn infer_topology(spec: &BlockSpec, motors: &[BlockId], specs: &[BlockSpec]) -> Topology {
    let any_hbot = motors.iter().any(|m| {
        matches!(
            specs[m.0].part,
            PartSpec::Motor {
                kinematics: MotorKinematics::HBot,
                ..
            }
        )
    });
    if any_hbot || (spec.kind == ComponentKind::CrossStage && motors.len() == 2) {
        Topology::HBot
    } else if spec.kind == ComponentKind::ParallelStage || motors.len() > 1 {
        Topology::Parallel
    } else {
        Topology::DirectDrive
    }
}

fn stage_kinematics(
    stage: &str,
    topology: Topology,
    axes: &[Axis],
    motors: &[BlockId],
) -> Result<StageKinematics, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidStage {
        stage: stage.to_string(),
        reason,
    };

    match topology {
        Topology::DirectDrive => match (axes, motors) {
            ([axis], [motor]) => Ok(StageKinematics::DirectDrive {
                axis: *axis,
                motor: *motor,
            }),
            _ => Err(invalid(format!(
                "direct drive needs one axis and one motor, got {} axes and {} motors",
                axes.len(),
                motors.len()
            ))),
        },
        Topology::HBot => match (axes, motors) {
            ([a, b], [m0, m1]) if a != b => Ok(StageKinematics::HBot {
                axes: [*a, *b],
                motors: [*m0, *m1],
            }),
            ([axis], [m0, m1]) => Ok(StageKinematics::HBotAxis {
                axis: *axis,
                motors: [*m0, *m1],
                term: HBotTerm::Sum,
            }),
            _ => Err(invalid(format!(
                "H-bot needs two motors and one or two distinct axes, got {} axes and {} motors",
                axes.len(),
                motors.len()
            ))),
        },
        Topology::Parallel => match axes {
            [axis] if !motors.is_empty() => Ok(StageKinematics::Parallel {
                axis: *axis,
                motors: motors.to_vec(),
            }),
            _ => Err(invalid(format!(
                "parallel stage needs one axis and at least one motor, got {} axes and {} motors",
                axes.len(),
                motors.len()
            ))),
        },
    }
}

/// 共享同一对电机的 H-bot 分轴中，轴序最前者承担和项，其余承担差项
fn assign_hbot_terms(blocks: &mut [Block]) {
    let mut groups: HashMap<[BlockId; 2], Vec<(usize, usize)>> = HashMap::new();
    for (index, block) in blocks.iter().enumerate() {
        if let Some(StageKinematics::HBotAxis { axis, motors, .. }) = block.stage().map(|s| &s.kinematics) {
            let mut key = *motors;
            key.sort();
            groups.entry(key).or_default().push((axis.index(), index));
        }
    }

    for mut members in groups.into_values() {
        members.sort();
        for (position, (_, index)) in members.into_iter().enumerate() {
            if let Part::Stage(Stage {
                kinematics: StageKinematics::HBotAxis { term, .. },
                ..
            }) = &mut blocks[index].part
            {
                *term = if position == 0 {
                    HBotTerm::Sum
                } else {
                    HBotTerm::Difference
                };
            }
        }
    }
}

/// H-bot 平台上与给定电机配对的另一个电机
fn hbot_partner(blocks: &[Block], motor: BlockId) -> Option<BlockId> {
    blocks.iter().find_map(|b| {
        let [m0, m1] = match b.stage().map(|s| &s.kinematics) {
            Some(StageKinematics::HBot { motors, .. }) | Some(StageKinematics::HBotAxis { motors, .. }) => *motors,
            _ => return None,
        };
        if m0 == motor {
            Some(m1)
        } else if m1 == motor {
            Some(m0)
        } else {
            None
        }
    })
}

/// 已加载的机器
#[derive(Debug, Clone)]
pub struct Machine {
    name: String,
    blocks: Vec<Block>,
    by_name: HashMap<String, BlockId>,
    connections: Vec<Connection>,
    envelope: Option<Region>,
    regions: Vec<Region>,
    forest: KinematicForest,
}

impl Machine {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    /// 显式修改积木位置（运动传播之外的唯一入口）
    pub fn place_block(&mut self, id: BlockId, position: Point3) {
        self.blocks[id.0].position = position;
    }

    pub fn id_of(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    pub fn find(&self, name: &str) -> Option<&Block> {
        self.id_of(name).map(|id| self.block(id))
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn forest(&self) -> &KinematicForest {
        &self.forest
    }

    pub fn work_envelope(&self) -> Option<&Region> {
        self.envelope.as_ref()
    }

    pub fn envelope_regions(&self) -> &[Region] {
        &self.regions
    }

    /// 所有受驱动的平台
    pub fn stages(&self) -> impl Iterator<Item = (&Block, &Stage)> {
        self.blocks.iter().filter_map(|b| b.stage().map(|s| (b, s)))
    }

    pub fn motors(&self) -> impl Iterator<Item = (&Block, &Motor)> {
        self.blocks.iter().filter_map(|b| b.motor().map(|m| (b, m)))
    }

    /// 主工具：第一条链上的工具积木，没有工具时取第一个根
    pub fn primary_tool(&self) -> &Block {
        let roots = self.forest.roots();
        roots
            .iter()
            .map(|r| self.block(self.forest.node(*r).block))
            .find(|b| b.kind == ComponentKind::Tool)
            .unwrap_or_else(|| self.block(self.forest.node(roots[0]).block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Face;
    use crate::test_support;

    #[test]
    fn test_flags_are_derived() {
        let machine = test_support::gantry_machine();
        let nozzle = machine.find("nozzle").unwrap();
        assert!(nozzle.end_block);
        assert!(!nozzle.base_block);

        let motor = machine.find("motorA").unwrap();
        assert!(!motor.end_block);
        assert!(motor.base_block);

        let plate = machine.find("plate").unwrap();
        assert!(plate.end_block);
    }

    #[test]
    fn test_motor_driven_stages_and_pairs() {
        let machine = test_support::hbot_machine();
        let motor_a = machine.find("motorA").unwrap().motor().unwrap();
        let gantry = machine.id_of("gantry").unwrap();
        assert_eq!(motor_a.driven_stages, vec![gantry]);
        assert_eq!(motor_a.pair, machine.id_of("motorB"));

        let stage = machine.block(gantry).stage().unwrap();
        assert_eq!(stage.kinematics.topology(), Topology::HBot);
        assert_eq!(stage.kinematics.axes(), &[Axis::X, Axis::Z]);
    }

    #[test]
    fn test_duplicate_attachment_is_rejected() {
        let result = MachineBuilder::new("broken")
            .block(BlockSpec::new("a", ComponentKind::LinearStage, Dimensions::cube(10.0)))
            .block(BlockSpec::new("b", ComponentKind::LinearStage, Dimensions::cube(10.0)))
            .block(BlockSpec::new("pen", ComponentKind::Tool, Dimensions::cube(10.0)))
            .connect(ConnectionSpec::new("a", Face::new(Axis::X, true), "pen", Face::new(Axis::X, false)))
            .connect(ConnectionSpec::new("b", Face::new(Axis::X, true), "pen", Face::new(Axis::X, false)))
            .build();
        assert!(matches!(result, Err(ConfigurationError::DuplicateAttachment { .. })));
    }

    #[test]
    fn test_unknown_block_is_rejected() {
        let result = MachineBuilder::new("broken")
            .block(BlockSpec::new("pen", ComponentKind::Tool, Dimensions::cube(10.0)))
            .connect(ConnectionSpec::new("ghost", Face::new(Axis::X, true), "pen", Face::new(Axis::X, false)))
            .build();
        assert!(matches!(
            result,
            Err(ConfigurationError::UnknownBlock { ref name, .. }) if name == "ghost"
        ));
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let result = MachineBuilder::new("broken")
            .block(BlockSpec::new("pen", ComponentKind::Tool, Dimensions::cube(10.0)))
            .block(BlockSpec::new("pen", ComponentKind::Tool, Dimensions::cube(10.0)))
            .build();
        assert_eq!(result.unwrap_err(), ConfigurationError::DuplicateBlock("pen".to_string()));
    }

    fn build_with_stage(axes: Vec<Axis>, motors: &[&str], topology: Topology) -> Result<Machine, ConfigurationError> {
        let mut builder = MachineBuilder::new("broken");
        for motor in ["m0", "m1", "m2"] {
            builder = builder.block(BlockSpec::motor(motor, Dimensions::cube(20.0)));
        }
        builder
            .block(
                BlockSpec::new("gantry", ComponentKind::CrossStage, Dimensions::cube(100.0)).with_part(
                    PartSpec::Stage {
                        axes,
                        motors: motors.iter().map(|m| m.to_string()).collect(),
                        topology: Some(topology),
                        drive: DriveMechanism::default(),
                    },
                ),
            )
            .block(BlockSpec::new("pen", ComponentKind::Tool, Dimensions::cube(10.0)))
            .build()
    }

    #[test]
    fn test_invalid_stage_topology() {
        let cases = [
            (vec![Axis::X, Axis::X], vec!["m0", "m1"], Topology::HBot),
            (vec![Axis::X, Axis::Z], vec!["m0", "m1", "m2"], Topology::HBot),
            (vec![Axis::X, Axis::Z], vec!["m0"], Topology::HBot),
            (vec![Axis::X, Axis::Z], vec!["m0", "m1"], Topology::Parallel),
            (vec![Axis::X], vec!["m0", "m1"], Topology::DirectDrive),
        ];
        for (axes, motors, topology) in cases {
            let result = build_with_stage(axes.clone(), &motors, topology);
            assert!(
                matches!(
                    result,
                    Err(ConfigurationError::InvalidStage { ref stage, .. }) if stage == "gantry"
                ),
                "{:?} {:?} {:?} should be invalid",
                topology,
                axes,
                motors
            );
        }
    }

    #[test]
    fn test_single_axis_hbot_is_split_hbot() {
        let machine = build_with_stage(vec![Axis::X], &["m0", "m1"], Topology::HBot).unwrap();
        let gantry = machine.block(machine.id_of("gantry").unwrap());
        assert!(matches!(
            gantry.stage().map(|s| &s.kinematics),
            Some(StageKinematics::HBotAxis { axis: Axis::X, term: HBotTerm::Sum, .. })
        ));
    }

    #[test]
    fn test_stage_driven_by_non_motor() {
        let result = MachineBuilder::new("broken")
            .block(BlockSpec::linear_stage("rail", Dimensions::cube(100.0), Axis::X, &["pen"]))
            .block(BlockSpec::new("pen", ComponentKind::Tool, Dimensions::cube(10.0)))
            .build();
        assert_eq!(result.unwrap_err(), ConfigurationError::NotAMotor("pen".to_string()));
    }

    #[test]
    fn test_split_hbot_axes_get_terms() {
        let machine = test_support::split_hbot_machine();
        let term = |name: &str| match machine.find(name).unwrap().stage().unwrap().kinematics {
            StageKinematics::HBotAxis { term, .. } => term,
            ref other => panic!("unexpected kinematics {:?}", other),
        };
        assert_eq!(term("top"), HBotTerm::Sum);
        assert_eq!(term("bottom"), HBotTerm::Difference);
        let motor_b = machine.find("motorB").unwrap().motor().unwrap();
        assert_eq!(motor_b.pair, machine.id_of("motorA"));
        assert_eq!(motor_b.driven_stages.len(), 2);
    }

    #[test]
    fn test_primary_tool() {
        let machine = test_support::gantry_machine();
        assert_eq!(machine.primary_tool().name, "nozzle");
    }
}
