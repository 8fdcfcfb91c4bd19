//! 逻辑时间模拟
//!
//! 不依赖真实时间，直接推进控制器的逻辑时钟，用于快速预览一段练习。

use std::io::Write;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};
use lingo_player::{
    FreePlaySnapshot, FreePlayer, GuidedSession, GuidedSnapshot, PlaybackSpeed, PlayerConfig,
    PlayerEvent,
};
use lingo_playlist::Playlist;
use serde::Serialize;

use crate::history::{HistoryEntry, PhraseHistory};
use crate::CliError;

const STEP: Duration = Duration::from_secs(1);

/// 自由播放模拟参数
#[derive(Debug, Clone)]
pub struct FreePlayOptions {
    pub seconds: u64,
    pub shuffle: bool,
    pub repeat: bool,
    pub speed: PlaybackSpeed,
}

impl Default for FreePlayOptions {
    fn default() -> Self {
        Self {
            seconds: 60,
            shuffle: false,
            repeat: false,
            speed: PlaybackSpeed::Normal,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreePlayReport {
    pub simulated_seconds: u64,
    pub final_state: FreePlaySnapshot,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub budget_minutes: u32,
    pub completed_count: u64,
    pub final_state: GuidedSnapshot,
    pub history: Vec<HistoryEntry>,
}

/// 从第一句开始模拟自由播放，每秒输出一行快照，播放停止时提前结束
pub fn simulate_free(
    playlist: Playlist,
    config: &PlayerConfig,
    options: &FreePlayOptions,
    out: &mut dyn Write,
) -> Result<FreePlayReport, CliError> {
    let (evt_tx, evt_rx) = unbounded();
    let mut history = PhraseHistory::default();

    let mut player = FreePlayer::open(playlist, 0, config, evt_tx)?;
    if options.shuffle {
        player.toggle_shuffle();
    }
    if options.repeat {
        player.toggle_repeat();
    }
    player.set_speed(options.speed);
    player.play();

    let mut simulated = 0;
    while simulated < options.seconds && player.is_playing() {
        player.advance(STEP);
        simulated += 1;
        drain_history(&evt_rx, &mut history);
        serde_json::to_writer(&mut *out, &player.snapshot())?;
        writeln!(out)?;
    }
    drain_history(&evt_rx, &mut history);

    Ok(FreePlayReport {
        simulated_seconds: simulated,
        final_state: player.snapshot(),
        history: history.entries().cloned().collect(),
    })
}

/// 模拟一整段引导练习直到时间用完
pub fn simulate_session(
    playlist: Playlist,
    config: &PlayerConfig,
    budget_minutes: u32,
) -> Result<SessionReport, CliError> {
    let (evt_tx, evt_rx) = unbounded();
    let mut history = PhraseHistory::default();

    let mut session = GuidedSession::new(playlist, config, evt_tx);
    session.start(budget_minutes)?;
    while session.is_active() {
        session.advance(STEP);
        drain_history(&evt_rx, &mut history);
    }

    Ok(SessionReport {
        budget_minutes,
        completed_count: session.completed_count(),
        final_state: session.snapshot(),
        history: history.entries().cloned().collect(),
    })
}

fn drain_history(evt_rx: &Receiver<PlayerEvent>, history: &mut PhraseHistory) {
    for event in evt_rx.try_iter() {
        if let PlayerEvent::PhraseChanged(phrase) = event {
            history.record(&phrase);
        }
    }
}
