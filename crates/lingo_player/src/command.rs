//! 播放命令和事件定义

use lingo_playlist::{PhraseRecord, Playlist};
use serde::Serialize;

use crate::PlayerError;

/// 播放器命令（UI -> 引擎）
#[derive(Debug, Clone)]
pub enum PlayerCommand {
    /// 打开自由播放，从指定短语开始播放
    OpenFreePlay { playlist: Playlist, index: usize },
    /// 播放
    Play,
    /// 暂停
    Pause,
    /// 播放/暂停切换
    TogglePlay,
    /// 跳转到当前短语的指定比例位置 (0.0 - 1.0)
    Seek(f64),
    /// 下一句
    Next,
    /// 上一句
    Previous,
    /// 设置倍速
    SetSpeed(f64),
    ToggleShuffle,
    ToggleRepeat,
    /// 开始限时引导练习
    StartSession { playlist: Playlist, budget_minutes: u32 },
    /// 暂停/继续练习
    PauseResumeSession,
    /// 结束练习，返回配置界面
    StopSession,
    SkipBack,
    SkipForward,
    /// 关闭当前界面，释放其全部定时器
    CloseSurface,
    /// 关闭引擎
    Shutdown,
}

/// 播放器事件（引擎 -> UI）
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// 自由播放状态快照
    FreePlay(FreePlaySnapshot),
    /// 引导练习状态快照
    Guided(GuidedSnapshot),
    /// 当前短语变更（供历史记录使用）
    PhraseChanged(PhraseRecord),
    /// 练习时间用完，画面停留在最后状态
    SessionExpired,
    /// 练习被结束，返回配置界面
    SessionEnded,
    /// 错误
    Error(String),
}

/// 自由播放倍速
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackSpeed {
    Half,
    ThreeQuarters,
    #[default]
    Normal,
    OneAndQuarter,
}

impl PlaybackSpeed {
    pub const ALL: [PlaybackSpeed; 4] = [
        PlaybackSpeed::Half,
        PlaybackSpeed::ThreeQuarters,
        PlaybackSpeed::Normal,
        PlaybackSpeed::OneAndQuarter,
    ];

    pub fn multiplier(self) -> f64 {
        match self {
            PlaybackSpeed::Half => 0.5,
            PlaybackSpeed::ThreeQuarters => 0.75,
            PlaybackSpeed::Normal => 1.0,
            PlaybackSpeed::OneAndQuarter => 1.25,
        }
    }

    pub fn from_multiplier(value: f64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|speed| (speed.multiplier() - value).abs() < 1e-9)
    }
}

impl TryFrom<f64> for PlaybackSpeed {
    type Error = PlayerError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::from_multiplier(value)
            .ok_or_else(|| PlayerError::InvalidArgument(format!("unsupported speed {}", value)))
    }
}

/// 引导练习阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    /// 听原句
    #[default]
    Listening,
    /// 停顿跟读
    PauseForRepeat,
    /// 再听一遍巩固
    Reinforcement,
}

/// 自由播放状态快照
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreePlaySnapshot {
    pub current_phrase_id: String,
    pub current_index: usize,
    pub elapsed_seconds: f64,
    pub duration_seconds: f64,
    pub is_playing: bool,
    pub shuffle_enabled: bool,
    pub repeat_enabled: bool,
    pub speed_multiplier: f64,
}

/// 引导练习状态快照
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidedSnapshot {
    pub current_phrase_id: String,
    pub current_index: usize,
    pub phase: SessionPhase,
    pub phase_countdown: u8,
    pub session_remaining_seconds: u64,
    pub completed_count: u64,
    pub is_active: bool,
}
