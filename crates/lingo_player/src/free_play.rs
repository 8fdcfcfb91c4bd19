//! 自由播放控制器
//!
//! 用户自由控制的播放：播放/暂停、拖动进度、倍速、随机、循环。
//! 播放过程以逻辑时钟的周期计时模拟，每次计时累加 `周期 × 倍速` 的已播时长。

use std::time::Duration;

use crossbeam_channel::{Sender, TrySendError};
use lingo_playlist::{PhraseRecord, Playlist};
use tracing::debug;

use crate::{
    FreePlaySnapshot, IndexPicker, PlaybackClock, PlaybackSpeed, PlayerConfig, PlayerError,
    PlayerEvent, ThreadIndexPicker, TimerHandle,
};

/// 浮点累加误差容限，已播时长与总时长的差小于此值即视为播放结束
const END_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
enum FreePlayTimer {
    Elapsed,
}

/// 自由播放控制器
pub struct FreePlayer {
    playlist: Playlist,
    current_index: usize,
    elapsed_secs: f64,
    fallback_duration: f64,
    speed: PlaybackSpeed,
    shuffle: bool,
    repeat: bool,
    playing: bool,
    tick: Duration,
    clock: PlaybackClock<FreePlayTimer>,
    ticker: Option<TimerHandle>,
    picker: Box<dyn IndexPicker>,
    evt_tx: Sender<PlayerEvent>,
}

impl FreePlayer {
    /// 选中一条短语，创建处于暂停状态的播放器
    pub fn open(
        playlist: Playlist,
        index: usize,
        config: &PlayerConfig,
        evt_tx: Sender<PlayerEvent>,
    ) -> Result<Self, PlayerError> {
        if playlist.is_empty() {
            return Err(PlayerError::InvalidState("playlist is empty"));
        }
        if index >= playlist.len() {
            return Err(PlayerError::InvalidArgument(format!(
                "phrase index {} out of range (playlist has {})",
                index,
                playlist.len()
            )));
        }
        let speed = PlaybackSpeed::try_from(config.default_speed)?;

        let player = Self {
            playlist,
            current_index: index,
            elapsed_secs: 0.0,
            fallback_duration: config.phrase_duration_secs,
            speed,
            shuffle: false,
            repeat: false,
            playing: false,
            tick: config.free_play_tick(),
            clock: PlaybackClock::new(),
            ticker: None,
            picker: Box::new(ThreadIndexPicker::new()),
            evt_tx,
        };

        player.emit_phrase();
        player.emit_snapshot();
        Ok(player)
    }

    /// 替换随机索引来源
    pub fn with_picker(mut self, picker: Box<dyn IndexPicker>) -> Self {
        self.picker = picker;
        self
    }

    pub fn play(&mut self) {
        if !self.playing {
            self.playing = true;
            self.ticker = Some(self.clock.start(self.tick, FreePlayTimer::Elapsed));
            debug!(index = self.current_index, elapsed = self.elapsed_secs, "free play resumed");
        }
        self.emit_snapshot();
    }

    pub fn pause(&mut self) {
        if self.playing {
            self.halt();
            debug!(index = self.current_index, elapsed = self.elapsed_secs, "free play paused");
        }
        self.emit_snapshot();
    }

    pub fn toggle_play(&mut self) {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// 跳转到当前短语的 `fraction` 位置，超出 [0, 1] 的值取最近边界
    pub fn seek(&mut self, fraction: f64) -> Result<(), PlayerError> {
        if fraction.is_nan() {
            return Err(PlayerError::InvalidArgument("seek fraction is NaN".into()));
        }
        self.elapsed_secs = fraction.clamp(0.0, 1.0) * self.duration_secs();
        self.emit_snapshot();
        Ok(())
    }

    /// 只影响之后的计时增量，不重算已累计的时长
    pub fn set_speed(&mut self, speed: PlaybackSpeed) {
        self.speed = speed;
        self.emit_snapshot();
    }

    pub fn next(&mut self) {
        self.elapsed_secs = 0.0;
        if let Some(index) = self.following_index() {
            self.move_to(index);
        }
        self.emit_snapshot();
    }

    /// 只在不是第一句时后退，不回绕，不受随机影响
    pub fn previous(&mut self) {
        if self.current_index > 0 {
            self.elapsed_secs = 0.0;
            self.move_to(self.current_index - 1);
        }
        self.emit_snapshot();
    }

    pub fn toggle_shuffle(&mut self) {
        self.shuffle = !self.shuffle;
        self.emit_snapshot();
    }

    pub fn toggle_repeat(&mut self) {
        self.repeat = !self.repeat;
        self.emit_snapshot();
    }

    /// 推进逻辑时间，依次处理期间到期的计时
    pub fn advance(&mut self, by: Duration) {
        let deadline = self.clock.now() + by;
        while let Some(timer) = self.clock.pop_due(deadline) {
            match timer {
                FreePlayTimer::Elapsed => self.on_tick(),
            }
        }
        self.clock.settle(deadline);
    }

    /// 距下一次计时的时长，暂停时为 None
    pub fn until_next(&self) -> Option<Duration> {
        self.clock.until_next()
    }

    fn on_tick(&mut self) {
        self.elapsed_secs += self.tick.as_millis() as f64 * self.speed.multiplier() / 1000.0;

        if self.elapsed_secs + END_EPSILON >= self.duration_secs() {
            self.end_of_track();
        }
        self.emit_snapshot();
    }

    /// 播放到结尾：与 `next()` 相同的导航规则，但最后一句且未开循环时停止播放
    fn end_of_track(&mut self) {
        self.elapsed_secs = 0.0;
        match self.following_index() {
            Some(index) => self.move_to(index),
            None => {
                self.halt();
                debug!(index = self.current_index, "reached end of playlist");
            }
        }
    }

    /// 导航规则：随机优先，其次顺序前进，最后一句时按循环设置回到开头或停留
    fn following_index(&mut self) -> Option<usize> {
        let last = self.playlist.last_index()?;

        if self.shuffle {
            Some(self.picker.pick(self.playlist.len()).min(last))
        } else if self.current_index < last {
            Some(self.current_index + 1)
        } else if self.repeat {
            Some(0)
        } else {
            None
        }
    }

    fn move_to(&mut self, index: usize) {
        let changed = index != self.current_index;
        self.current_index = index;
        if changed {
            debug!(index, "free play phrase changed");
            self.emit_phrase();
        }
    }

    fn halt(&mut self) {
        self.playing = false;
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_phrase(&self) -> &PhraseRecord {
        &self.playlist.phrases()[self.current_index]
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    /// 当前短语的固定时长
    pub fn duration_secs(&self) -> f64 {
        self.current_phrase().duration_or(self.fallback_duration)
    }

    pub fn speed(&self) -> PlaybackSpeed {
        self.speed
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle
    }

    pub fn repeat_enabled(&self) -> bool {
        self.repeat
    }

    pub fn snapshot(&self) -> FreePlaySnapshot {
        FreePlaySnapshot {
            current_phrase_id: self.current_phrase().id.clone(),
            current_index: self.current_index,
            elapsed_seconds: self.elapsed_secs,
            duration_seconds: self.duration_secs(),
            is_playing: self.playing,
            shuffle_enabled: self.shuffle,
            repeat_enabled: self.repeat,
            speed_multiplier: self.speed.multiplier(),
        }
    }

    /// 快照只反映最新状态，通道已满时丢弃，不阻塞计时
    fn emit_snapshot(&self) {
        if let Err(TrySendError::Full(_)) =
            self.evt_tx.try_send(PlayerEvent::FreePlay(self.snapshot()))
        {
            debug!("event channel full, free play snapshot dropped");
        }
    }

    fn emit_phrase(&self) {
        let _ = self
            .evt_tx
            .send(PlayerEvent::PhraseChanged(self.current_phrase().clone()));
    }
}
