//! Millwright 运动学树引擎
//!
//! 模拟由参数化机械积木（直线台、十字台、电机、工具）通过面对面连接
//! 装配而成的运动控制机器（3D 打印机、绘图仪、贴片机……）。
//!
//! # 架构设计
//!
//! - `machine`: 按名称描述的积木与连接 → 不可变的机器快照
//! - `tree`: 以末端积木为根的运动学森林
//! - `kinematics`: 轴向位移 → 电机步数（直驱 / H-bot / 并联）
//! - `propagation`: 电机转动 → 沿树传播的积木位移
//! - `envelope`: 零点坐标系与工作包络
//! - `sequencer`: 指令队列，同一时刻最多一批运动在途
//!
//! # 示例
//!
//! ```rust
//! use millwright_core::prelude::*;
//!
//! let machine = MachineBuilder::new("plotter")
//!     .block(BlockSpec::motor("motorX", Dimensions::cube(20.0)))
//!     .block(
//!         BlockSpec::linear_stage("rail", Dimensions::new(200.0, 20.0, 20.0), Axis::X, &["motorX"])
//!             .at(Point3::origin()),
//!     )
//!     .block(BlockSpec::new("pen", ComponentKind::Tool, Dimensions::new(10.0, 40.0, 10.0)))
//!     .connect(ConnectionSpec::new("rail", "-x".parse().unwrap(), "motorX", "+x".parse().unwrap()))
//!     .connect(ConnectionSpec::new("rail", "+y".parse().unwrap(), "pen", "-y".parse().unwrap()))
//!     .build()
//!     .unwrap();
//!
//! let steps = compute_motor_steps(&machine, &Vector3::new(50.0, 0.0, 0.0));
//! assert_eq!(steps["motorX"], 50.0);
//! ```

pub mod assembly;
pub mod block;
pub mod connection;
pub mod envelope;
pub mod error;
pub mod instruction;
pub mod kinematics;
pub mod machine;
pub mod math;
pub mod propagation;
pub mod scene;
pub mod sequencer;
pub mod settings;
pub mod tree;

#[cfg(test)]
mod test_support;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::block::{
        Block, BlockId, ComponentKind, Dimensions, DriveKind, DriveMechanism, MotorKinematics, Topology,
    };
    pub use crate::connection::{ConnectionSpec, End, Face};
    pub use crate::envelope::{EnvelopeManager, EnvelopeShape, Region, ZeroFrame};
    pub use crate::error::{ConfigurationError, MotionError};
    pub use crate::instruction::{parse_line, parse_program, Instruction, ParseError};
    pub use crate::kinematics::{compute_motor_steps, displacement_of, MotorSteps};
    pub use crate::machine::{BlockSpec, Machine, MachineBuilder, PartSpec};
    pub use crate::math::{Axis, Point3, Rotation3, Vector3};
    pub use crate::propagation::{BlockMove, MotionBatch, MotionPropagator};
    pub use crate::scene::{
        CollectingSink, InstantRenderer, MessageSink, MotionContext, Renderer, TimedRenderer, TracingSink,
    };
    pub use crate::sequencer::{Dispatch, MotionSequencer, RunReport, SequencerState};
    pub use crate::settings::SimulationSettings;
    pub use crate::tree::{build_tree, KinematicForest, KinematicNode, NodeId};
}
