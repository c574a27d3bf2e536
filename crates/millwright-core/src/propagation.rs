//! 运动传播
//!
//! 电机转动 → 被驱动平台的位移 → 沿树向根传播到每个积木（连同孤儿）。
//! 位移累加到待定目标位置表中，提交时一次性发给渲染器，
//! 所有过渡完成后才写回积木位置。

use crate::block::BlockId;
use crate::kinematics::displacement_of;
use crate::machine::Machine;
use crate::math::{Point3, Vector3};
use crate::scene::Renderer;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::time::Duration;

/// 一个积木的移动
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockMove {
    pub block: BlockId,
    pub from: Point3,
    pub to: Point3,
}

impl BlockMove {
    pub fn displacement(&self) -> Vector3 {
        self.to - self.from
    }
}

/// 已提交、正在动画中的一批移动
pub struct MotionBatch {
    moves: Vec<BlockMove>,
    completion: BoxFuture<'static, ()>,
}

impl MotionBatch {
    pub fn moves(&self) -> &[BlockMove] {
        &self.moves
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// 等待所有过渡完成
    pub async fn settle(self) -> Vec<BlockMove> {
        self.completion.await;
        self.moves
    }
}

impl std::fmt::Debug for MotionBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionBatch")
            .field("moves", &self.moves)
            .finish_non_exhaustive()
    }
}

/// 运动传播器
#[derive(Debug, Default)]
pub struct MotionPropagator {
    /// 积木 → 待定目标位置
    pending: BTreeMap<BlockId, Point3>,
}

impl MotionPropagator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &BTreeMap<BlockId, Point3> {
        &self.pending
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// 丢弃尚未提交的目标
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// 电机转动给定步数，累加所有随动积木的待定位置
    ///
    /// 返回本次转动造成的移动；电机不驱动任何平台时为空。
    pub fn apply_motor_rotation(&mut self, machine: &Machine, motor: BlockId, steps: f64) -> Vec<BlockMove> {
        let forest = machine.forest();
        let mut moves = Vec::new();

        for (stage, displacement) in displacement_of(machine, motor, steps) {
            let Some(node) = forest.node_of(stage) else {
                tracing::debug!("Stage {} is not part of any kinematic chain", machine.block(stage).name);
                continue;
            };
            for block in forest.co_moving_blocks(node) {
                let from = self
                    .pending
                    .get(&block)
                    .copied()
                    .unwrap_or(machine.block(block).position);
                let to = from + displacement;
                self.pending.insert(block, to);
                moves.push(BlockMove { block, from, to });
            }
        }

        moves
    }

    /// 把所有待定目标提交给渲染器
    ///
    /// 清空待定表；积木位置要等 [`MotionBatch::settle`] 之后由
    /// [`MotionPropagator::finish`] 写回。
    pub fn commit_pending_positions(
        &mut self,
        machine: &Machine,
        renderer: &dyn Renderer,
        duration: Duration,
    ) -> MotionBatch {
        let pending = std::mem::take(&mut self.pending);
        let mut moves = Vec::with_capacity(pending.len());
        let mut transitions = Vec::with_capacity(pending.len());

        for (block, to) in pending {
            let b = machine.block(block);
            let from = b.position;
            transitions.push(renderer.request_animated_move(&b.name, from, to, duration));
            moves.push(BlockMove { block, from, to });
        }

        tracing::info!("Committed {} block moves", moves.len());
        MotionBatch {
            moves,
            completion: futures::future::join_all(transitions).map(|_| ()).boxed(),
        }
    }

    /// 过渡完成后写回目标位置
    pub fn finish(&self, machine: &mut Machine, moves: &[BlockMove]) {
        for m in moves {
            machine.place_block(m.block, m.to);
        }
    }
}
