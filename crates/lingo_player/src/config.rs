//! 播放器配置

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::PlaybackSpeed;

/// 配置错误
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 播放器配置（JSON 中所有字段均可省略）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// 短语未自带时长时使用的固定时长（秒）
    pub phrase_duration_secs: f64,
    /// 自由播放计时周期（毫秒）
    pub free_play_tick_ms: u64,
    /// 允许的练习时长（分钟）
    pub session_minutes: Vec<u32>,
    /// 自由播放初始倍速
    pub default_speed: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            phrase_duration_secs: 3.0,
            free_play_tick_ms: 100,
            session_minutes: vec![5, 10, 15, 20],
            default_speed: 1.0,
        }
    }
}

impl PlayerConfig {
    /// 解析并校验 JSON 配置
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载配置
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.phrase_duration_secs.is_finite() || self.phrase_duration_secs <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "phrase_duration_secs must be positive, got {}",
                self.phrase_duration_secs
            )));
        }
        if self.free_play_tick_ms == 0 {
            return Err(ConfigError::Invalid("free_play_tick_ms must be non-zero".into()));
        }
        if self.session_minutes.is_empty() || self.session_minutes.contains(&0) {
            return Err(ConfigError::Invalid(
                "session_minutes must list at least one non-zero budget".into(),
            ));
        }
        if PlaybackSpeed::from_multiplier(self.default_speed).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unsupported default_speed {}",
                self.default_speed
            )));
        }
        Ok(())
    }

    pub fn free_play_tick(&self) -> Duration {
        Duration::from_millis(self.free_play_tick_ms)
    }

    pub fn is_allowed_budget(&self, minutes: u32) -> bool {
        self.session_minutes.contains(&minutes)
    }
}
