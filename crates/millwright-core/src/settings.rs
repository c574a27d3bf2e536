//! 模拟参数

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 单次移动允许的最长动画时长（秒）
pub const MAX_TRANSITION_SECONDS: f64 = 3600.0;

/// 模拟参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationSettings {
    /// 每次移动的动画时长（秒）
    pub transition_seconds: f64,

    /// 注释等非运动指令的异步间隔（毫秒）
    pub comment_tick_ms: u64,

    /// 定义中未给出步距比时使用的默认值
    pub default_step_ratio: f64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            transition_seconds: 1.0,
            comment_tick_ms: 10,
            default_step_ratio: 1.0,
        }
    }
}

impl SimulationSettings {
    /// 动画时长，限制在 [0, MAX_TRANSITION_SECONDS]
    pub fn transition_duration(&self) -> Duration {
        let seconds = if self.transition_seconds.is_nan() {
            0.0
        } else {
            self.transition_seconds.clamp(0.0, MAX_TRANSITION_SECONDS)
        };
        Duration::try_from_secs_f64(seconds).unwrap_or_default()
    }

    /// 检查参数取值
    pub fn validate(&self) -> Result<(), String> {
        if !self.transition_seconds.is_finite()
            || !(0.0..=MAX_TRANSITION_SECONDS).contains(&self.transition_seconds)
        {
            return Err(format!(
                "transitionSeconds must be between 0 and {}, got {}",
                MAX_TRANSITION_SECONDS, self.transition_seconds
            ));
        }
        if !self.default_step_ratio.is_finite() || self.default_step_ratio <= 0.0 {
            return Err(format!(
                "defaultStepRatio must be a positive number, got {}",
                self.default_step_ratio
            ));
        }
        Ok(())
    }

    pub fn comment_tick(&self) -> Duration {
        Duration::from_millis(self.comment_tick_ms)
    }
}
