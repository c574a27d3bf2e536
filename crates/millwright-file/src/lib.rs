//! Millwright 文件处理
//!
//! 支持：
//! - 机器定义（JSON）
//! - 作业文件（G 代码文本）
//! - 模拟参数（JSON）

pub mod definition;
pub mod error;
pub mod job;
pub mod settings;

pub use definition::{load_machine, MachineDefinition};
pub use error::FileError;
pub use job::load_job;
pub use settings::load_settings;
