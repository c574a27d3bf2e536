//! 运动序列器
//!
//! 按顺序执行指令队列，同一时刻最多一批运动在途：
//!
//! ```text
//! Idle --move--> AwaitingMotion --运动完成--> Idle
//!   |                  |
//!   |                  +--move--> 拒绝 (MotorsBusy)，状态不变
//!   +--校验失败--> Error
//! 队列耗尽 --> Complete
//! ```
//!
//! 注释等非运动指令在一个短暂的异步间隔后通过，从不与触发它的调用同步完成。

use crate::envelope::EnvelopeManager;
use crate::error::MotionError;
use crate::instruction::Instruction;
use crate::kinematics::{compute_motor_steps, MotorSteps};
use crate::machine::Machine;
use crate::math::{Axis, Point3};
use crate::propagation::{BlockMove, MotionBatch, MotionPropagator};
use crate::scene::MotionContext;
use crate::settings::SimulationSettings;
use std::collections::VecDeque;

/// 序列器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    AwaitingMotion,
    Complete,
    Error,
}

/// 单条指令的执行结果
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// 已提交一批运动
    Motion { target: Point3, steps: MotorSteps },
    /// 已重新建立零点
    Zeroed,
    /// 注释或空行
    PassThrough,
    /// 未识别的指令，已跳过
    Skipped,
}

/// 运行统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub moves: usize,
    pub zeros: usize,
    pub passed: usize,
    pub skipped: usize,
    pub rejected: usize,
}

/// 运动序列器
pub struct MotionSequencer {
    machine: Machine,
    context: MotionContext,
    settings: SimulationSettings,
    envelope: EnvelopeManager,
    propagator: MotionPropagator,
    queue: VecDeque<Instruction>,
    state: SequencerState,
    /// 在途运动及其控制坐标目标
    in_flight: Option<(MotionBatch, Point3)>,
    /// 当前指令位置（控制坐标）
    position: Point3,
    last_error: Option<MotionError>,
    report: RunReport,
}

impl MotionSequencer {
    pub fn new(machine: Machine, context: MotionContext, settings: SimulationSettings) -> Self {
        let envelope = EnvelopeManager::for_machine(&machine);
        Self {
            machine,
            context,
            settings,
            envelope,
            propagator: MotionPropagator::new(),
            queue: VecDeque::new(),
            state: SequencerState::Idle,
            in_flight: None,
            position: Point3::origin(),
            last_error: None,
            report: RunReport::default(),
        }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn position(&self) -> Point3 {
        self.position
    }

    pub fn envelope(&self) -> &EnvelopeManager {
        &self.envelope
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn last_error(&self) -> Option<&MotionError> {
        self.last_error.as_ref()
    }

    pub fn motors_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// 追加指令
    pub fn load_program(&mut self, instructions: impl IntoIterator<Item = Instruction>) {
        self.queue.extend(instructions);
        if self.state == SequencerState::Complete {
            self.state = SequencerState::Idle;
        }
    }

    /// 切换机器：丢弃队列、待定运动和零点
    pub fn reinitialize_for_machine(&mut self, machine: Machine) {
        tracing::info!("Reinitializing sequencer for machine '{}'", machine.name());
        self.envelope = EnvelopeManager::for_machine(&machine);
        self.machine = machine;
        self.propagator.clear();
        self.queue.clear();
        self.in_flight = None;
        self.position = Point3::origin();
        self.state = SequencerState::Idle;
        self.last_error = None;
        self.report = RunReport::default();
    }

    /// 立即执行一条指令
    ///
    /// 移动指令只提交运动，不等待完成；需要再调用 [`Self::wait_for_motion`]。
    pub fn execute(&mut self, instruction: &Instruction) -> Result<Dispatch, MotionError> {
        match instruction {
            Instruction::Move { .. } => self.execute_move(instruction),
            Instruction::Zero => {
                if self.motors_busy() {
                    return Err(self.refuse());
                }
                self.envelope.zero(&self.machine);
                self.position = Point3::origin();
                self.state = SequencerState::Idle;
                self.report.zeros += 1;
                Ok(Dispatch::Zeroed)
            }
            Instruction::Comment(text) => {
                tracing::debug!("; {}", text);
                self.report.passed += 1;
                Ok(Dispatch::PassThrough)
            }
            Instruction::Nop => {
                self.report.passed += 1;
                Ok(Dispatch::PassThrough)
            }
            Instruction::Unknown(line) => {
                tracing::warn!("Skipping unsupported instruction: {}", line);
                self.report.skipped += 1;
                Ok(Dispatch::Skipped)
            }
        }
    }

    fn execute_move(&mut self, instruction: &Instruction) -> Result<Dispatch, MotionError> {
        if self.motors_busy() {
            return Err(self.refuse());
        }

        let mut target = self.position;
        for axis in Axis::ALL {
            if let Some(value) = instruction.target(axis) {
                target[axis.index()] = value;
            }
        }

        if !target.coords.iter().all(|v| v.is_finite()) {
            return Err(self.reject(MotionError::NonFiniteTarget { target }));
        }

        match self.envelope.contains_point(&target) {
            Ok(true) => {}
            Ok(false) => return Err(self.reject(MotionError::OutOfEnvelope { target })),
            Err(e) => return Err(self.reject(e)),
        }

        let displacement = target - self.position;
        let steps = compute_motor_steps(&self.machine, &displacement);
        for (name, value) in &steps {
            if let Some(motor) = self.machine.id_of(name) {
                self.propagator.apply_motor_rotation(&self.machine, motor, *value);
            }
        }
        let batch = self.propagator.commit_pending_positions(
            &self.machine,
            self.context.renderer.as_ref(),
            self.settings.transition_duration(),
        );

        tracing::info!(
            "Move to ({:.3}, {:.3}, {:.3}): {} motors, {} blocks",
            target.x,
            target.y,
            target.z,
            steps.len(),
            batch.moves().len()
        );
        self.in_flight = Some((batch, target));
        self.state = SequencerState::AwaitingMotion;
        self.last_error = None;
        self.report.moves += 1;
        Ok(Dispatch::Motion { target, steps })
    }

    fn refuse(&mut self) -> MotionError {
        let error = MotionError::MotorsBusy;
        self.context.sink.notify(&error.to_string());
        self.report.rejected += 1;
        error
    }

    fn reject(&mut self, error: MotionError) -> MotionError {
        self.context.sink.notify(&error.to_string());
        self.state = SequencerState::Error;
        self.last_error = Some(error.clone());
        self.report.rejected += 1;
        error
    }

    /// 等待在途运动完成并写回积木位置；没有在途运动时立即返回 None
    pub async fn wait_for_motion(&mut self) -> Option<Vec<BlockMove>> {
        let (batch, target) = self.in_flight.take()?;
        let moves = batch.settle().await;
        self.propagator.finish(&mut self.machine, &moves);
        self.position = target;
        self.state = SequencerState::Idle;
        Some(moves)
    }

    /// 执行队列中的下一条指令并等待其完成
    ///
    /// 队列耗尽时进入 Complete 并返回 None。
    pub async fn step(&mut self) -> Option<Result<Dispatch, MotionError>> {
        self.wait_for_motion().await;

        let Some(instruction) = self.queue.pop_front() else {
            self.state = SequencerState::Complete;
            return None;
        };

        let result = self.execute(&instruction);
        match &result {
            Ok(Dispatch::Motion { .. }) => {
                self.wait_for_motion().await;
            }
            Ok(_) => tokio::time::sleep(self.settings.comment_tick()).await,
            Err(e) => tracing::warn!("Rejected '{}': {}", instruction, e),
        }
        Some(result)
    }

    /// 执行整个队列
    pub async fn run(&mut self) -> RunReport {
        while self.step().await.is_some() {}
        tracing::info!("Program complete: {:?}", self.report);
        self.report.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Dimensions;
    use crate::envelope::{EnvelopeShape, Region};
    use crate::instruction::parse_program;
    use crate::math::{Vector3, EPSILON};
    use crate::scene::{CollectingSink, InstantRenderer, Renderer};
    use crate::test_support;
    use futures::channel::oneshot;
    use futures::future::{BoxFuture, Shared};
    use futures::FutureExt;
    use std::sync::Arc;
    use std::time::Duration;

    fn move_to(x: Option<f64>, y: Option<f64>, z: Option<f64>) -> Instruction {
        Instruction::Move { x, y, z }
    }

    fn sequencer(machine: Machine) -> (MotionSequencer, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::new());
        let context = MotionContext::new(Arc::new(InstantRenderer), sink.clone());
        (MotionSequencer::new(machine, context, SimulationSettings::default()), sink)
    }

    /// 直到测试放行才完成的渲染器
    struct GatedRenderer {
        gate: Shared<oneshot::Receiver<()>>,
    }

    impl Renderer for GatedRenderer {
        fn request_animated_move(&self, _: &str, _: Point3, _: Point3, _: Duration) -> BoxFuture<'static, ()> {
            self.gate.clone().map(|_| ()).boxed()
        }
    }

    #[tokio::test]
    async fn test_move_requires_zero() {
        let (mut seq, sink) = sequencer(test_support::direct_drive_machine());
        let result = seq.execute(&move_to(Some(10.0), None, None));
        assert_eq!(result, Err(MotionError::NotZeroed));
        assert_eq!(seq.state(), SequencerState::Error);
        assert_eq!(sink.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_direct_drive_move() {
        let (mut seq, _) = sequencer(test_support::direct_drive_machine());
        let before: Vec<Point3> = seq.machine().blocks().iter().map(|b| b.position).collect();

        seq.execute(&Instruction::Zero).unwrap();
        let dispatch = seq.execute(&move_to(Some(50.0), None, None)).unwrap();
        let Dispatch::Motion { steps, .. } = dispatch else {
            panic!("expected motion");
        };
        assert_eq!(steps.len(), 1);
        assert!((steps["motorX"] - 50.0).abs() < EPSILON);
        assert_eq!(seq.state(), SequencerState::AwaitingMotion);

        seq.wait_for_motion().await.unwrap();
        assert_eq!(seq.state(), SequencerState::Idle);
        assert_eq!(seq.position(), Point3::new(50.0, 0.0, 0.0));
        for (block, old) in seq.machine().blocks().iter().zip(before) {
            assert!((block.position - old - Vector3::new(50.0, 0.0, 0.0)).norm() < EPSILON);
        }
    }

    #[tokio::test]
    async fn test_out_of_envelope_is_rejected_atomically() {
        let envelope = Region::new("we", EnvelopeShape::Box, Dimensions::cube(100.0), Point3::origin());
        let (mut seq, sink) = sequencer(test_support::direct_drive_machine_in(envelope));
        seq.execute(&Instruction::Zero).unwrap();
        let before: Vec<Point3> = seq.machine().blocks().iter().map(|b| b.position).collect();

        let result = seq.execute(&move_to(Some(200.0), None, None));
        assert!(matches!(result, Err(MotionError::OutOfEnvelope { .. })));
        assert_eq!(seq.state(), SequencerState::Error);
        assert!(!seq.motors_busy());
        assert!(seq.wait_for_motion().await.is_none());

        let after: Vec<Point3> = seq.machine().blocks().iter().map(|b| b.position).collect();
        assert_eq!(before, after);
        assert_eq!(seq.position(), Point3::origin());
        assert_eq!(sink.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_non_finite_target_is_rejected() {
        // 矩形在 z 轴上无界，无穷大的目标仍会通过包络检查
        let paper = Region::new("paper", EnvelopeShape::Rectangle, Dimensions::new(400.0, 400.0, 0.0), Point3::origin());
        let (mut seq, sink) = sequencer(test_support::direct_drive_machine_in(paper));
        seq.execute(&Instruction::Zero).unwrap();

        for bad in [f64::NAN, f64::INFINITY] {
            let result = seq.execute(&move_to(None, None, Some(bad)));
            assert!(matches!(result, Err(MotionError::NonFiniteTarget { .. })));
            assert_eq!(seq.state(), SequencerState::Error);
            assert!(!seq.motors_busy());
        }
        assert_eq!(seq.position(), Point3::origin());
        assert_eq!(sink.messages().len(), 2);

        // 之后的移动照常生效
        let Ok(Dispatch::Motion { steps, .. }) = seq.execute(&move_to(Some(10.0), None, None)) else {
            panic!("expected motion");
        };
        assert!((steps["motorX"] - 10.0).abs() < EPSILON);
        seq.wait_for_motion().await;
        assert_eq!(seq.position(), Point3::new(10.0, 0.0, 0.0));
    }

    #[tokio::test]
    async fn test_move_while_busy_is_refused() {
        let (tx, rx) = oneshot::channel::<()>();
        let sink = Arc::new(CollectingSink::new());
        let context = MotionContext::new(Arc::new(GatedRenderer { gate: rx.shared() }), sink.clone());
        let mut seq = MotionSequencer::new(test_support::direct_drive_machine(), context, SimulationSettings::default());
        let pen = seq.machine().id_of("pen").unwrap();
        let start = seq.machine().block(pen).position;

        seq.execute(&Instruction::Zero).unwrap();
        seq.execute(&move_to(Some(10.0), None, None)).unwrap();
        assert!(seq.motors_busy());

        assert_eq!(seq.execute(&move_to(Some(20.0), None, None)), Err(MotionError::MotorsBusy));
        assert_eq!(seq.state(), SequencerState::AwaitingMotion);
        assert_eq!(sink.messages(), vec![MotionError::MotorsBusy.to_string()]);

        {
            let mut wait = Box::pin(seq.wait_for_motion());
            assert!(futures::poll!(wait.as_mut()).is_pending());
            tx.send(()).unwrap();
            assert!(wait.await.is_some());
        }

        let moved = seq.machine().block(pen).position - start;
        assert!((moved - Vector3::new(10.0, 0.0, 0.0)).norm() < EPSILON);
        assert_eq!(seq.position(), Point3::new(10.0, 0.0, 0.0));
    }

    #[tokio::test]
    async fn test_absent_axes_keep_position() {
        let (mut seq, _) = sequencer(test_support::hbot_machine());
        seq.execute(&Instruction::Zero).unwrap();
        seq.execute(&move_to(Some(20.0), None, Some(10.0))).unwrap();
        seq.wait_for_motion().await;

        let Ok(Dispatch::Motion { steps, target }) = seq.execute(&move_to(None, None, Some(0.0))) else {
            panic!("expected motion");
        };
        assert_eq!(target, Point3::new(20.0, 0.0, 0.0));
        // 只有 z 变化 -10：m0 = -5，m1 = 5
        assert!((steps["motorA"] + 5.0).abs() < EPSILON);
        assert!((steps["motorB"] - 5.0).abs() < EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_program() {
        let (mut seq, _) = sequencer(test_support::hbot_machine());
        seq.load_program(parse_program(
            "; square\nG92\nG0 X20 Z10\nG0 X1000\nM3 S1000\nG1 X0 Z0 F3000\n",
        ));
        let report = seq.run().await;
        assert_eq!(
            report,
            RunReport {
                moves: 2,
                zeros: 1,
                passed: 1,
                skipped: 1,
                rejected: 1,
            }
        );
        assert_eq!(seq.state(), SequencerState::Complete);
        assert_eq!(seq.position(), Point3::origin());
        assert_eq!(seq.queued(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_comment_passes_on_tick() {
        let (mut seq, _) = sequencer(test_support::direct_drive_machine());
        let tick = SimulationSettings::default().comment_tick();
        seq.load_program(parse_program("; start\nG92\nG0 X10\n"));

        let start = tokio::time::Instant::now();
        {
            let mut step = Box::pin(seq.step());
            assert!(futures::poll!(step.as_mut()).is_pending());
            assert_eq!(step.await, Some(Ok(Dispatch::PassThrough)));
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= tick && elapsed < tick * 2, "comment took {:?}", elapsed);

        assert_eq!(seq.step().await, Some(Ok(Dispatch::Zeroed)));

        // 运动指令只等待渲染，不等待注释间隔
        let before = tokio::time::Instant::now();
        assert!(matches!(seq.step().await, Some(Ok(Dispatch::Motion { .. }))));
        assert_eq!(tokio::time::Instant::now(), before);
        assert_eq!(seq.position(), Point3::new(10.0, 0.0, 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_returns_to_idle_without_motion() {
        let (mut seq, _) = sequencer(test_support::direct_drive_machine());
        seq.load_program(vec![Instruction::Zero]);
        let result = seq.step().await.unwrap();
        assert_eq!(result, Ok(Dispatch::Zeroed));
        assert_eq!(seq.state(), SequencerState::Idle);
        assert!(seq.envelope().is_zeroed());
        assert!(seq.step().await.is_none());
        assert_eq!(seq.state(), SequencerState::Complete);
    }

    #[tokio::test]
    async fn test_reinitialize_discards_state() {
        let (mut seq, _) = sequencer(test_support::direct_drive_machine());
        seq.load_program(parse_program("G92\nG0 X10\n"));
        seq.execute(&Instruction::Zero).unwrap();
        seq.execute(&move_to(Some(5.0), None, None)).unwrap();

        seq.reinitialize_for_machine(test_support::hbot_machine());
        assert_eq!(seq.machine().name(), "hbot");
        assert!(!seq.motors_busy());
        assert!(!seq.envelope().is_zeroed());
        assert_eq!(seq.queued(), 0);
        assert_eq!(seq.state(), SequencerState::Idle);
        assert_eq!(seq.report(), &RunReport::default());
    }
}
