//! 运动指令解析
//!
//! 按行解析，只识别三个操作码：
//! - `G0` / `G1`：移动，可带 `X` `Y` `Z`（`F` `E` 忽略），缺省轴保持当前值
//! - `G92`：以当前位置重新建立零点
//! - `;` 之后为注释
//!
//! 其他操作码解析为 [`Instruction::Unknown`]，由调用方记录并跳过。

use crate::math::Axis;
use std::fmt;

/// 解析后的指令
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// 移动到控制坐标（未给出的轴为 None）
    Move {
        x: Option<f64>,
        y: Option<f64>,
        z: Option<f64>,
    },
    /// 重新建立零点
    Zero,
    /// 注释
    Comment(String),
    /// 空行
    Nop,
    /// 未识别的操作码
    Unknown(String),
}

impl Instruction {
    pub fn is_motion(&self) -> bool {
        matches!(self, Instruction::Move { .. })
    }

    /// 指定轴上的目标值
    pub fn target(&self, axis: Axis) -> Option<f64> {
        match self {
            Instruction::Move { x, y, z } => match axis {
                Axis::X => *x,
                Axis::Y => *y,
                Axis::Z => *z,
            },
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Move { .. } => {
                f.write_str("G0")?;
                for axis in Axis::ALL {
                    if let Some(value) = self.target(axis) {
                        write!(f, " {}{}", axis.name().to_uppercase(), value)?;
                    }
                }
                Ok(())
            }
            Instruction::Zero => f.write_str("G92"),
            Instruction::Comment(text) => write!(f, "; {}", text),
            Instruction::Nop => Ok(()),
            Instruction::Unknown(line) => f.write_str(line),
        }
    }
}

/// 解析错误
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// 无效的参数字
    InvalidWord { line: usize, word: String },
    /// 参数字缺少数值
    MissingValue { line: usize, word: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidWord { line, word } => write!(f, "Line {}: invalid word '{}'", line, word),
            ParseError::MissingValue { line, word } => write!(f, "Line {}: missing value for '{}'", line, word),
        }
    }
}

impl std::error::Error for ParseError {}

/// 解析一行（行号从 1 开始，仅用于错误信息）
pub fn parse_line(line_number: usize, line: &str) -> Result<Instruction, ParseError> {
    let (code, comment) = match line.find(';') {
        Some(pos) => (&line[..pos], Some(line[pos + 1..].trim())),
        None => (line, None),
    };

    let mut words = code.split_whitespace();
    let Some(opcode) = words.next() else {
        return Ok(match comment {
            Some(text) => Instruction::Comment(text.to_string()),
            None => Instruction::Nop,
        });
    };

    match opcode.to_ascii_uppercase().as_str() {
        "G0" | "G00" | "G1" | "G01" => {
            let (mut x, mut y, mut z) = (None, None, None);
            for word in words {
                let mut chars = word.chars();
                let letter = chars.next().map(|c| c.to_ascii_uppercase());
                let value = chars.as_str();
                let parse = || -> Result<f64, ParseError> {
                    if value.is_empty() {
                        return Err(ParseError::MissingValue {
                            line: line_number,
                            word: word.to_string(),
                        });
                    }
                    value
                        .parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .ok_or_else(|| ParseError::InvalidWord {
                            line: line_number,
                            word: word.to_string(),
                        })
                };
                match letter {
                    Some('X') => x = Some(parse()?),
                    Some('Y') => y = Some(parse()?),
                    Some('Z') => z = Some(parse()?),
                    Some('F') | Some('E') => {
                        parse()?;
                    }
                    _ => {
                        return Err(ParseError::InvalidWord {
                            line: line_number,
                            word: word.to_string(),
                        })
                    }
                }
            }
            Ok(Instruction::Move { x, y, z })
        }
        "G92" => Ok(Instruction::Zero),
        _ => Ok(Instruction::Unknown(code.trim().to_string())),
    }
}

/// 解析整个程序；无法解析的行记录警告后视为未知指令
pub fn parse_program(text: &str) -> Vec<Instruction> {
    text.lines()
        .enumerate()
        .map(|(index, line)| {
            parse_line(index + 1, line).unwrap_or_else(|e| {
                tracing::warn!("{}", e);
                Instruction::Unknown(line.trim().to_string())
            })
        })
        .collect()
}
