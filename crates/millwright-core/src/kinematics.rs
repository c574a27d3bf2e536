//! 逆运动学与正运动学
//!
//! 逆解：轴向位移 → 各电机步数，按平台拓扑分别计算并合并。
//! - 直驱：单轴位移交给唯一的电机
//! - H-bot / coreXY：`m0 = 0.5A + 0.5B`，`m1 = 0.5A - 0.5B`；
//!   拆成两个单轴平台时各自贡献自己的项
//! - 并联：轴向位移在电机间均分
//!
//! 所有步数都除以平台的步距比，电机反向时取负。
//!
//! 正解是逆解的精确逆运算，供运动传播使用。

use crate::block::{BlockId, HBotTerm, Stage, StageKinematics};
use crate::machine::Machine;
use crate::math::{Vector3, EPSILON};
use std::collections::BTreeMap;

/// 电机名 → 带符号步数（按名称排序）
pub type MotorSteps = BTreeMap<String, f64>;

/// 计算到达给定位移所需的电机步数
///
/// 不在运动学森林中的平台被忽略；步数为零的电机不出现在结果中。
pub fn compute_motor_steps(machine: &Machine, displacement: &Vector3) -> MotorSteps {
    let mut steps = MotorSteps::new();
    let forest = machine.forest();

    for (block, stage) in machine.stages() {
        if !forest.contains(block.id) {
            continue;
        }
        let ratio = stage.drive.step_displacement_ratio;
        let mut add = |motor: BlockId, value: f64| {
            let m = machine.block(motor);
            let sign = m.motor().map_or(1.0, |m| m.sign());
            *steps.entry(m.name.clone()).or_insert(0.0) += value / ratio * sign;
        };

        match &stage.kinematics {
            StageKinematics::DirectDrive { axis, motor } => {
                let shares = 1 + parallel_stages_on_axis(machine, block.id, stage);
                add(*motor, displacement[axis.index()] / shares as f64);
            }
            StageKinematics::HBot { axes, motors } => {
                let a = displacement[axes[0].index()];
                let b = displacement[axes[1].index()];
                add(motors[0], 0.5 * a + 0.5 * b);
                add(motors[1], 0.5 * a - 0.5 * b);
            }
            StageKinematics::HBotAxis { axis, motors, term } => {
                let d = displacement[axis.index()];
                add(motors[0], 0.5 * d);
                add(motors[1], 0.5 * d * term_sign(*term));
            }
            StageKinematics::Parallel { axis, motors } => {
                let share = displacement[axis.index()] / motors.len() as f64;
                for motor in motors {
                    add(*motor, share);
                }
            }
        }
    }

    steps.retain(|_, value| value.abs() > EPSILON);
    tracing::debug!("Motor steps for ({:.3}, {:.3}, {:.3}): {:?}", displacement.x, displacement.y, displacement.z, steps);
    steps
}

fn term_sign(term: HBotTerm) -> f64 {
    match term {
        HBotTerm::Sum => 1.0,
        HBotTerm::Difference => -1.0,
    }
}

/// 与该平台互为并联兄弟、且沿同一轴驱动的平台数量
///
/// 两根直驱丝杠共同抬起一根横梁时，每根只分担一半位移。
fn parallel_stages_on_axis(machine: &Machine, block: BlockId, stage: &Stage) -> usize {
    let forest = machine.forest();
    let Some(node) = forest.node_of(block) else {
        return 0;
    };
    forest
        .parallels(node)
        .iter()
        .filter_map(|p| machine.block(forest.node(*p).block).stage())
        .filter(|s| s.kinematics.axes() == stage.kinematics.axes())
        .count()
}

/// 电机转动给定步数时，它驱动的每个平台获得的位移
pub fn displacement_of(machine: &Machine, motor: BlockId, steps: f64) -> Vec<(BlockId, Vector3)> {
    let Some(m) = machine.block(motor).motor() else {
        return Vec::new();
    };
    let travel = steps * m.sign();

    m.driven_stages
        .iter()
        .filter_map(|&stage_id| {
            let stage = machine.block(stage_id).stage()?;
            let distance = travel * stage.drive.step_displacement_ratio;
            let displacement = match &stage.kinematics {
                StageKinematics::DirectDrive { axis, .. } | StageKinematics::Parallel { axis, .. } => {
                    axis.unit() * distance
                }
                StageKinematics::HBot { axes, motors } => {
                    // A = m0 + m1，B = m0 - m1
                    let b_sign = if motors[0] == motor { 1.0 } else { -1.0 };
                    axes[0].unit() * distance + axes[1].unit() * (b_sign * distance)
                }
                StageKinematics::HBotAxis { axis, motors, term } => {
                    let sign = if motors[0] == motor { 1.0 } else { term_sign(*term) };
                    axis.unit() * (sign * distance)
                }
            };
            Some((stage_id, displacement))
        })
        .collect()
}
