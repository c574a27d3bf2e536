//! 作业文件

use crate::error::FileError;
use millwright_core::instruction::{parse_program, Instruction};
use std::path::Path;

/// 读取并解析作业文件
pub fn load_job(path: &Path) -> Result<Vec<Instruction>, FileError> {
    let text = std::fs::read_to_string(path)?;
    let program = parse_program(&text);
    tracing::info!("Loaded {} instructions from {}", program.len(), path.display());
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_jobs_parse() {
        for text in [
            include_str!("../../../jobs/draw_square.gcode"),
            include_str!("../../../jobs/print_square.gcode"),
        ] {
            let program = parse_program(text);
            assert_eq!(program[0], Instruction::Zero);
            assert!(program[1..].iter().all(|i| i.is_motion()));
        }
    }

    #[test]
    fn test_load_job() {
        let path = std::env::temp_dir().join(format!("millwright-job-{}.gcode", std::process::id()));
        std::fs::write(&path, "G92\n; lift\nG0 Y5\n").unwrap();
        let program = load_job(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(program.len(), 3);
    }
}
