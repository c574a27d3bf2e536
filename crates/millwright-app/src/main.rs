//! Millwright 命令行入口
//! 加载机器定义与作业，在单线程 tokio 运行时上无界面地执行

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use millwright_core::machine::Machine;
use millwright_core::scene::{InstantRenderer, MotionContext, Renderer, TimedRenderer, TracingSink};
use millwright_core::sequencer::MotionSequencer;
use millwright_core::settings::SimulationSettings;
use millwright_core::tree::NodeId;

/// 在模拟机器上运行 G 代码作业
#[derive(Parser, Debug)]
#[command(name = "millwright", version, about)]
struct Cli {
    /// 机器定义（JSON）
    machine: PathBuf,

    /// 作业文件（G 代码）
    job: Option<PathBuf>,

    /// 模拟参数（JSON）
    #[arg(long)]
    settings: Option<PathBuf>,

    /// 按过渡时长实际等待
    #[arg(long)]
    realtime: bool,

    /// 打印运动学树
    #[arg(long)]
    tree: bool,

    /// 日志详细程度（-v 调试，-vv 跟踪）
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = match &cli.settings {
        Some(path) => millwright_file::load_settings(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => SimulationSettings::default(),
    };

    let machine = millwright_file::load_machine(&cli.machine, &settings)
        .with_context(|| format!("failed to load machine from {}", cli.machine.display()))?;

    if cli.tree {
        print_forest(&machine);
    }

    let Some(job) = &cli.job else {
        return Ok(());
    };
    let program = millwright_file::load_job(job).with_context(|| format!("failed to load job {}", job.display()))?;

    let renderer: Arc<dyn Renderer> = if cli.realtime {
        Arc::new(TimedRenderer)
    } else {
        Arc::new(InstantRenderer)
    };
    let context = MotionContext::new(renderer, Arc::new(TracingSink));

    let mut sequencer = MotionSequencer::new(machine, context, settings);
    sequencer.load_program(program);
    let report = sequencer.run().await;

    let tool = sequencer.machine().primary_tool();
    info!(
        "{} finished: {} moves, {} zeros, {} passed, {} skipped, {} rejected",
        job.display(),
        report.moves,
        report.zeros,
        report.passed,
        report.skipped,
        report.rejected
    );
    info!(
        "Tool '{}' at ({:.3}, {:.3}, {:.3})",
        tool.name, tool.position.x, tool.position.y, tool.position.z
    );

    Ok(())
}

/// 以缩进形式打印运动学森林
fn print_forest(machine: &Machine) {
    let forest = machine.forest();
    println!("{} ({} chains)", machine.name(), forest.roots().len());

    let mut stack: Vec<(NodeId, usize)> = forest.roots().iter().rev().map(|r| (*r, 0)).collect();
    while let Some((id, depth)) = stack.pop() {
        let node = forest.node(id);
        let block = machine.block(node.block);
        let marker = if node.is_orphan {
            " (orphan)"
        } else if !node.parallels.is_empty() {
            " (parallel)"
        } else {
            ""
        };
        println!("{}{} [{}]{}", "  ".repeat(depth + 1), block.name, block.kind.name(), marker);

        for child in node.children.iter().chain(&node.orphans).rev() {
            stack.push((*child, depth + 1));
        }
    }
}
