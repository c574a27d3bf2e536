//! 核心错误定义

use crate::math::Point3;
use thiserror::Error;

/// 机器配置错误
///
/// 在机器加载时产生，致命：运动学树不会被构建，机器在重新加载前不可用。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("No end block (tool) found in machine")]
    MissingTool,

    #[error("Unknown block '{name}' referenced by {context}")]
    UnknownBlock { name: String, context: String },

    #[error("Duplicate block name: {0}")]
    DuplicateBlock(String),

    #[error("Block '{add}' is fixed twice at face {face} end {end}")]
    DuplicateAttachment {
        add: String,
        face: String,
        end: String,
    },

    #[error("Block '{0}' is connected to itself")]
    SelfConnection(String),

    #[error("Invalid stage '{stage}': {reason}")]
    InvalidStage { stage: String, reason: String },

    #[error("Block '{0}' is not a motor")]
    NotAMotor(String),

    #[error("End block '{0}' is connected as the base of another chain")]
    EndBlockInChain(String),
}

/// 运动错误
///
/// 均可恢复：对应的指令被原子性地拒绝，不会施加任何电机步数。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    #[error("Machine has not been zeroed")]
    NotZeroed,

    #[error("Target ({:.3}, {:.3}, {:.3}) lies outside the work envelope", .target.x, .target.y, .target.z)]
    OutOfEnvelope { target: Point3 },

    #[error("Motors are busy; move refused")]
    MotorsBusy,

    #[error("Target ({}, {}, {}) is not a finite point", .target.x, .target.y, .target.z)]
    NonFiniteTarget { target: Point3 },
}
