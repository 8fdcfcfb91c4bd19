//! 短语记录

use serde::{Deserialize, Serialize};

/// 双语短语（由外部目录持有，只读）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhraseRecord {
    pub id: String,
    /// 母语文本
    pub primary_text: String,
    /// 目标语言文本
    pub target_text: String,
    /// 录音时长（秒），缺省时使用播放器配置的固定时长
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl PhraseRecord {
    pub fn new(
        id: impl Into<String>,
        primary_text: impl Into<String>,
        target_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            primary_text: primary_text.into(),
            target_text: target_text.into(),
            duration_secs: None,
        }
    }

    /// 指定录音时长
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    /// 实际时长：记录自带的优先，否则使用 `fallback`
    pub fn duration_or(&self, fallback: f64) -> f64 {
        self.duration_secs.unwrap_or(fallback)
    }
}
