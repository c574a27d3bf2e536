//! 模拟参数文件

use crate::error::FileError;
use millwright_core::settings::SimulationSettings;
use std::path::Path;

/// 读取模拟参数；缺省的字段使用默认值
pub fn load_settings(path: &Path) -> Result<SimulationSettings, FileError> {
    let text = std::fs::read_to_string(path)?;
    let settings: SimulationSettings = serde_json::from_str(&text)?;
    settings.validate().map_err(FileError::InvalidSettings)?;
    tracing::info!("Loaded settings from {}: {:?}", path.display(), settings);
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file() {
        let result = load_settings(Path::new("/nonexistent/millwright-settings.json"));
        assert!(matches!(result, Err(FileError::Io(_))));
    }

    #[test]
    fn test_load_settings() {
        let path = std::env::temp_dir().join(format!("millwright-settings-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "commentTickMs": 0, "transitionSeconds": 0.5 }"#).unwrap();
        let settings = load_settings(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(settings.comment_tick_ms, 0);
        assert_eq!(settings.transition_seconds, 0.5);
        assert_eq!(settings.default_step_ratio, 1.0);
    }

    #[test]
    fn test_out_of_range_transition_is_rejected() {
        let path = std::env::temp_dir().join(format!("millwright-settings-range-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "transitionSeconds": 1e300 }"#).unwrap();
        let result = load_settings(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(FileError::InvalidSettings(_))));
    }
}
