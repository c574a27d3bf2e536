//! 单元测试用的机器

use crate::block::{ComponentKind, Dimensions, DriveMechanism, MotorKinematics};
use crate::connection::{ConnectionSpec, End, Face};
use crate::envelope::{EnvelopeShape, Region};
use crate::machine::{BlockSpec, Machine, MachineBuilder, PartSpec};
use crate::math::{Axis, Point3};

fn face(s: &str) -> Face {
    s.parse().unwrap()
}

fn connect(base: &str, base_face: &str, add: &str, add_face: &str) -> ConnectionSpec {
    ConnectionSpec::new(base, face(base_face), add, face(add_face))
}

pub(crate) fn box_envelope(size: f64) -> Region {
    Region::new("workEnvelope", EnvelopeShape::Box, Dimensions::cube(size), Point3::origin())
}

fn direct_drive_builder(envelope: Region) -> MachineBuilder {
    MachineBuilder::new("direct drive")
        .block(BlockSpec::motor("motorX", Dimensions::cube(20.0)))
        .block(
            BlockSpec::linear_stage("stageX", Dimensions::new(200.0, 20.0, 20.0), Axis::X, &["motorX"])
                .at(Point3::origin()),
        )
        .block(BlockSpec::new("carriage", ComponentKind::ToolAssembly, Dimensions::cube(20.0)))
        .block(BlockSpec::new("pen", ComponentKind::Tool, Dimensions::new(10.0, 40.0, 10.0)))
        .connect(connect("stageX", "-x", "motorX", "+x"))
        .connect(connect("stageX", "+y", "carriage", "-y"))
        .connect(connect("carriage", "+z", "pen", "-z"))
        .work_envelope(envelope)
}

/// 单轴直驱：motorX → stageX → carriage → pen
pub(crate) fn direct_drive_machine() -> Machine {
    direct_drive_machine_in(box_envelope(400.0))
}

pub(crate) fn direct_drive_machine_in(envelope: Region) -> Machine {
    direct_drive_builder(envelope).build().unwrap()
}

/// 多一个未连接的积木
pub(crate) fn direct_drive_machine_with_spare() -> Machine {
    direct_drive_builder(box_envelope(400.0))
        .block(BlockSpec::new("spare", ComponentKind::ToolAssembly, Dimensions::cube(10.0)))
        .build()
        .unwrap()
}

fn hbot_motor(name: &str) -> BlockSpec {
    BlockSpec::motor(name, Dimensions::cube(50.0)).with_part(PartSpec::Motor {
        kinematics: MotorKinematics::HBot,
        invert_steps: false,
        pair: None,
    })
}

/// H-bot 十字台（x/z 轴）带一支笔
pub(crate) fn hbot_machine() -> Machine {
    MachineBuilder::new("hbot")
        .block(hbot_motor("motorA"))
        .block(hbot_motor("motorB"))
        .block(
            BlockSpec::new("gantry", ComponentKind::CrossStage, Dimensions::new(250.0, 25.0, 250.0))
                .with_part(PartSpec::Stage {
                    axes: vec![Axis::X, Axis::Z],
                    motors: vec!["motorA".to_string(), "motorB".to_string()],
                    topology: None,
                    drive: DriveMechanism::default(),
                })
                .at(Point3::origin()),
        )
        .block(BlockSpec::new("pen", ComponentKind::Tool, Dimensions::new(10.0, 50.0, 10.0)))
        .connect(connect("gantry", "-y", "pen", "+y"))
        .connect(connect("gantry", "+z", "motorA", "-z"))
        .connect(connect("gantry", "-z", "motorB", "+z"))
        .work_envelope(box_envelope(400.0))
        .build()
        .unwrap()
}

/// H-bot 拆成两个单轴平台（类似 AxiDraw）：top 为 x，bottom 为 z
pub(crate) fn split_hbot_machine() -> Machine {
    let stage = |name: &str, dimensions: Dimensions, axis: Axis| {
        BlockSpec::linear_stage(name, dimensions, axis, &["motorA", "motorB"])
    };
    MachineBuilder::new("split hbot")
        .block(hbot_motor("motorA"))
        .block(hbot_motor("motorB"))
        .block(stage("bottom", Dimensions::new(50.0, 50.0, 250.0), Axis::Z).at(Point3::new(50.0, 37.6, 0.0)))
        .block(stage("top", Dimensions::new(250.0, 25.0, 50.0), Axis::X))
        .block(BlockSpec::new("servo", ComponentKind::ToolAssembly, Dimensions::new(12.5, 25.0, 50.0)))
        .block(BlockSpec::new("pen", ComponentKind::Tool, Dimensions::new(10.0, 50.0, 10.0)))
        .connect(connect("bottom", "-y", "top", "+y"))
        .connect(connect("top", "+x", "servo", "-x"))
        .connect(connect("bottom", "+z", "motorA", "-z"))
        .connect(connect("bottom", "-z", "motorB", "+z"))
        .connect(connect("servo", "+x", "pen", "-x"))
        .build()
        .unwrap()
}

/// 龙门：两根并联丝杠抬起横梁，横梁带喷头；另一条链是热床
pub(crate) fn gantry_machine() -> Machine {
    let screw = |name: &str, motor: &str, z: f64| {
        BlockSpec::linear_stage(name, Dimensions::new(10.0, 150.0, 10.0), Axis::Y, &[motor])
            .at(Point3::new(0.0, 75.0, z))
    };
    MachineBuilder::new("gantry")
        .block(BlockSpec::motor("motorA", Dimensions::cube(20.0)))
        .block(BlockSpec::motor("motorB", Dimensions::cube(20.0)))
        .block(BlockSpec::motor("beamMotor", Dimensions::cube(20.0)))
        .block(BlockSpec::motor("plateMotor", Dimensions::cube(20.0)))
        .block(screw("screwA", "motorA", -100.0))
        .block(screw("screwB", "motorB", 100.0))
        .block(BlockSpec::linear_stage("beam", Dimensions::new(20.0, 20.0, 210.0), Axis::Z, &["beamMotor"]))
        .block(BlockSpec::new("hotend", ComponentKind::ToolAssembly, Dimensions::cube(20.0)))
        .block(BlockSpec::new("nozzle", ComponentKind::Tool, Dimensions::new(10.0, 20.0, 10.0)))
        .block(
            BlockSpec::linear_stage("plateBelt", Dimensions::new(160.0, 20.0, 20.0), Axis::X, &["plateMotor"])
                .at(Point3::new(0.0, 10.0, 0.0)),
        )
        .block(BlockSpec::new("plate", ComponentKind::Platform, Dimensions::new(130.0, 10.0, 130.0)))
        .connect(connect("motorA", "-y", "screwA", "+y"))
        .connect(connect("motorB", "-y", "screwB", "+y"))
        .connect(connect("screwA", "+x", "beam", "-x").with_ends(End::Center, End::Toward(face("+z"))))
        .connect(connect("screwB", "+x", "beam", "-x").with_ends(End::Center, End::Toward(face("-z"))))
        .connect(connect("beam", "+z", "beamMotor", "-x"))
        .connect(connect("beam", "+x", "hotend", "-x"))
        .connect(connect("hotend", "+x", "nozzle", "-x"))
        .connect(connect("plateBelt", "+x", "plateMotor", "-x"))
        .connect(connect("plateBelt", "+y", "plate", "-y"))
        .work_envelope(box_envelope(400.0))
        .build()
        .unwrap()
}
