//! 限时引导练习控制器
//!
//! 每条短语依次经过 听原句 -> 停顿跟读 -> 巩固再听 三个阶段，结束后自动进入下一条，
//! 最后一条之后回到第一条。练习总时长在开始时确定，用完即停在当时的画面。
//!
//! 会话计时与阶段计时共用同一个逻辑时钟：暂停时挂起时钟，两者的剩余时间都原样保留。

use std::time::Duration;

use crossbeam_channel::{Sender, TrySendError};
use lingo_playlist::{PhraseRecord, Playlist};
use tracing::{debug, info};

use crate::{
    GuidedSnapshot, PlaybackClock, PlayerConfig, PlayerError, PlayerEvent, SessionPhase,
    TimerHandle,
};

/// 会话倒计时与跟读倒计时的周期
pub const SESSION_TICK: Duration = Duration::from_secs(1);
/// 听原句阶段时长
pub const LISTEN_DELAY: Duration = Duration::from_millis(2000);
/// 巩固阶段时长
pub const REINFORCEMENT_DELAY: Duration = Duration::from_millis(2000);
/// 跟读倒计时起始值
pub const REPEAT_COUNTDOWN: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GuidedTimer {
    /// 会话剩余时间
    Session,
    /// 听原句/巩固阶段结束
    PhaseDone,
    /// 跟读倒计时
    Countdown,
}

/// 引导练习控制器
pub struct GuidedSession {
    playlist: Playlist,
    config: PlayerConfig,
    current_index: usize,
    phase: SessionPhase,
    phase_countdown: u8,
    remaining_secs: u64,
    completed: u64,
    active: bool,
    started: bool,
    clock: PlaybackClock<GuidedTimer>,
    session_timer: Option<TimerHandle>,
    phase_timer: Option<TimerHandle>,
    evt_tx: Sender<PlayerEvent>,
}

impl GuidedSession {
    /// 创建尚未开始的练习
    pub fn new(playlist: Playlist, config: &PlayerConfig, evt_tx: Sender<PlayerEvent>) -> Self {
        Self {
            playlist,
            config: config.clone(),
            current_index: 0,
            phase: SessionPhase::Listening,
            phase_countdown: REPEAT_COUNTDOWN,
            remaining_secs: 0,
            completed: 0,
            active: false,
            started: false,
            clock: PlaybackClock::new(),
            session_timer: None,
            phase_timer: None,
            evt_tx,
        }
    }

    /// 开始（或重新开始）练习
    pub fn start(&mut self, budget_minutes: u32) -> Result<(), PlayerError> {
        if self.playlist.is_empty() {
            return Err(PlayerError::InvalidState("cannot start a session on an empty playlist"));
        }
        if !self.config.is_allowed_budget(budget_minutes) {
            return Err(PlayerError::InvalidArgument(format!(
                "unsupported session budget {} min (allowed: {:?})",
                budget_minutes, self.config.session_minutes
            )));
        }

        self.clock.clear();
        self.clock.resume();
        self.phase_timer = None;

        self.remaining_secs = u64::from(budget_minutes) * 60;
        self.current_index = 0;
        self.completed = 0;
        self.active = true;
        self.started = true;

        // 会话计时先注册，同一时刻到期时先于阶段计时处理
        self.session_timer = Some(self.clock.start(SESSION_TICK, GuidedTimer::Session));
        self.enter_phase(SessionPhase::Listening);

        info!(
            budget_minutes,
            phrases = self.playlist.len(),
            "guided session started"
        );
        self.emit_phrase();
        self.emit_snapshot();
        Ok(())
    }

    /// 暂停/继续。暂停期间所有计时冻结，继续时从原处接着走
    ///
    /// 时间用完后只重发当前快照。
    pub fn pause_resume(&mut self) -> Result<(), PlayerError> {
        self.ensure_started()?;
        if self.is_expired() {
            debug!("pause/resume ignored, session time is used up");
            self.emit_snapshot();
            return Ok(());
        }

        self.active = !self.active;
        if self.active {
            self.clock.resume();
        } else {
            self.clock.suspend();
        }
        info!(active = self.active, "guided session toggled");
        self.emit_snapshot();
        Ok(())
    }

    /// 结束练习，通知调用方返回配置界面
    pub fn stop(&mut self) -> Result<(), PlayerError> {
        self.ensure_started()?;
        self.halt();
        self.started = false;
        info!(completed = self.completed, "guided session stopped");
        self.emit_snapshot();
        let _ = self.evt_tx.send(PlayerEvent::SessionEnded);
        Ok(())
    }

    /// 回到上一句（不回绕），不改变当前阶段
    pub fn skip_back(&mut self) -> Result<(), PlayerError> {
        self.ensure_started()?;
        if self.is_expired() {
            self.emit_snapshot();
            return Ok(());
        }
        self.move_to(self.current_index.saturating_sub(1));
        self.emit_snapshot();
        Ok(())
    }

    /// 前进到下一句（不回绕），并从听原句阶段重新开始
    pub fn skip_forward(&mut self) -> Result<(), PlayerError> {
        self.ensure_started()?;
        if self.is_expired() {
            self.emit_snapshot();
            return Ok(());
        }
        let last = self.playlist.last_index().unwrap_or(0);
        self.move_to((self.current_index + 1).min(last));
        self.enter_phase(SessionPhase::Listening);
        self.emit_snapshot();
        Ok(())
    }

    /// 推进逻辑时间，依次处理期间到期的计时
    pub fn advance(&mut self, by: Duration) {
        let deadline = self.clock.now() + by;
        while let Some(timer) = self.clock.pop_due(deadline) {
            match timer {
                GuidedTimer::Session => self.on_session_tick(),
                GuidedTimer::PhaseDone => self.on_phase_done(),
                GuidedTimer::Countdown => self.on_countdown_tick(),
            }
            self.emit_snapshot();
        }
        self.clock.settle(deadline);
    }

    /// 距下一次计时的时长；未开始、暂停或已结束时为 None
    pub fn until_next(&self) -> Option<Duration> {
        self.clock.until_next()
    }

    fn on_session_tick(&mut self) {
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.halt();
            info!(
                completed = self.completed,
                phase = ?self.phase,
                "guided session time is up"
            );
            let _ = self.evt_tx.send(PlayerEvent::SessionExpired);
        }
    }

    fn on_phase_done(&mut self) {
        match self.phase {
            SessionPhase::Listening => self.enter_phase(SessionPhase::PauseForRepeat),
            SessionPhase::Reinforcement => self.complete_phrase(),
            SessionPhase::PauseForRepeat => {}
        }
    }

    /// 倒计时大于 1 时递减，否则进入巩固阶段
    fn on_countdown_tick(&mut self) {
        if self.phase != SessionPhase::PauseForRepeat {
            return;
        }
        if self.phase_countdown > 1 {
            self.phase_countdown -= 1;
        } else {
            self.enter_phase(SessionPhase::Reinforcement);
        }
    }

    /// 自动前进：计数加一，最后一条之后回到第一条
    fn complete_phrase(&mut self) {
        self.completed += 1;
        let next = if self.current_index + 1 >= self.playlist.len() {
            0
        } else {
            self.current_index + 1
        };
        self.move_to(next);
        self.enter_phase(SessionPhase::Listening);
    }

    /// 切换阶段并替换阶段计时
    fn enter_phase(&mut self, phase: SessionPhase) {
        if let Some(timer) = self.phase_timer.take() {
            timer.cancel();
        }

        self.phase = phase;
        self.phase_countdown = REPEAT_COUNTDOWN;
        let timer = match phase {
            SessionPhase::Listening => self.clock.once(LISTEN_DELAY, GuidedTimer::PhaseDone),
            SessionPhase::PauseForRepeat => self.clock.start(SESSION_TICK, GuidedTimer::Countdown),
            SessionPhase::Reinforcement => {
                self.clock.once(REINFORCEMENT_DELAY, GuidedTimer::PhaseDone)
            }
        };
        self.phase_timer = Some(timer);
        debug!(index = self.current_index, ?phase, "guided phase entered");
    }

    fn move_to(&mut self, index: usize) {
        if index != self.current_index {
            self.current_index = index;
            self.emit_phrase();
        }
    }

    /// 停止全部计时，状态保持不动
    fn halt(&mut self) {
        self.active = false;
        self.session_timer = None;
        self.phase_timer = None;
        self.clock.clear();
    }

    fn ensure_started(&self) -> Result<(), PlayerError> {
        if self.started {
            Ok(())
        } else {
            Err(PlayerError::InvalidState("no guided session is running"))
        }
    }

    fn is_expired(&self) -> bool {
        self.remaining_secs == 0
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// 当前短语（空列表时为 None）
    pub fn current_phrase(&self) -> Option<&PhraseRecord> {
        self.playlist.get(self.current_index)
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn phase_countdown(&self) -> u8 {
        self.phase_countdown
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn completed_count(&self) -> u64 {
        self.completed
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn snapshot(&self) -> GuidedSnapshot {
        GuidedSnapshot {
            current_phrase_id: self
                .current_phrase()
                .map(|p| p.id.clone())
                .unwrap_or_default(),
            current_index: self.current_index,
            phase: self.phase,
            phase_countdown: self.phase_countdown,
            session_remaining_seconds: self.remaining_secs,
            completed_count: self.completed,
            is_active: self.active,
        }
    }

    fn emit_snapshot(&self) {
        if let Err(TrySendError::Full(_)) =
            self.evt_tx.try_send(PlayerEvent::Guided(self.snapshot()))
        {
            debug!("event channel full, guided snapshot dropped");
        }
    }

    fn emit_phrase(&self) {
        if let Some(phrase) = self.current_phrase() {
            let _ = self.evt_tx.send(PlayerEvent::PhraseChanged(phrase.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::{unbounded, Receiver};

    use super::*;

    fn playlist(n: usize) -> Playlist {
        let phrases = (0..n)
            .map(|i| PhraseRecord::new(format!("p{}", i), format!("primary {}", i), format!("target {}", i)))
            .collect();
        Playlist::new(phrases).unwrap()
    }

    fn started(n: usize, minutes: u32) -> (GuidedSession, Receiver<PlayerEvent>) {
        let (tx, rx) = unbounded();
        let mut session = GuidedSession::new(playlist(n), &PlayerConfig::default(), tx);
        session.start(minutes).unwrap();
        (session, rx)
    }

    fn secs(v: u64) -> Duration {
        Duration::from_secs(v)
    }

    #[test]
    fn test_start_initial_state() {
        let (session, rx) = started(3, 5);
        assert!(session.is_active());
        assert_eq!(session.remaining_secs(), 300);
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.phase(), SessionPhase::Listening);
        assert_eq!(session.phase_countdown(), 3);
        assert_eq!(session.completed_count(), 0);

        let events: Vec<_> = rx.try_iter().collect();
        assert!(matches!(&events[0], PlayerEvent::PhraseChanged(p) if p.id == "p0"));
        assert!(matches!(&events[1], PlayerEvent::Guided(s) if s.is_active));
    }

    #[test]
    fn test_start_rejects_empty_playlist() {
        let (tx, _rx) = unbounded();
        let mut session =
            GuidedSession::new(Playlist::new(Vec::new()).unwrap(), &PlayerConfig::default(), tx);
        assert!(matches!(session.start(5), Err(PlayerError::InvalidState(_))));
        assert!(!session.is_active());
    }

    #[test]
    fn test_start_rejects_unknown_budget() {
        let (tx, _rx) = unbounded();
        let mut session = GuidedSession::new(playlist(2), &PlayerConfig::default(), tx);
        assert!(matches!(session.start(7), Err(PlayerError::InvalidArgument(_))));
        assert!(!session.is_started());
        assert_eq!(session.remaining_secs(), 0);
        assert_eq!(session.until_next(), None);
    }

    #[test]
    fn test_operations_before_start_are_rejected() {
        let (tx, _rx) = unbounded();
        let mut session = GuidedSession::new(playlist(2), &PlayerConfig::default(), tx);
        assert!(matches!(session.pause_resume(), Err(PlayerError::InvalidState(_))));
        assert!(matches!(session.skip_forward(), Err(PlayerError::InvalidState(_))));
        assert!(matches!(session.skip_back(), Err(PlayerError::InvalidState(_))));
        assert!(matches!(session.stop(), Err(PlayerError::InvalidState(_))));
    }

    #[test]
    fn test_phase_cycle() {
        let (mut session, _rx) = started(3, 5);

        session.advance(Duration::from_millis(1999));
        assert_eq!(session.phase(), SessionPhase::Listening);
        session.advance(Duration::from_millis(1));
        assert_eq!(session.phase(), SessionPhase::PauseForRepeat);
        assert_eq!(session.phase_countdown(), 3);

        session.advance(secs(1));
        assert_eq!(session.phase(), SessionPhase::PauseForRepeat);
        assert_eq!(session.phase_countdown(), 2);
        session.advance(secs(1));
        assert_eq!(session.phase_countdown(), 1);
        session.advance(secs(1));
        assert_eq!(session.phase(), SessionPhase::Reinforcement);
        assert_eq!(session.current_index(), 0);

        session.advance(secs(2));
        assert_eq!(session.phase(), SessionPhase::Listening);
        assert_eq!(session.phase_countdown(), 3);
        assert_eq!(session.current_index(), 1);
        assert_eq!(session.completed_count(), 1);
        assert_eq!(session.remaining_secs(), 300 - 7);
    }

    #[test]
    fn test_automatic_advance_wraps_to_first() {
        let (mut session, rx) = started(2, 5);
        // 每条短语一轮 7 秒
        session.advance(secs(14));
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.completed_count(), 2);

        let ids: Vec<_> = rx
            .try_iter()
            .filter_map(|e| match e {
                PlayerEvent::PhraseChanged(p) => Some(p.id),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["p0", "p1", "p0"]);
    }

    #[test]
    fn test_session_expires_after_budget() {
        let (mut session, rx) = started(3, 5);
        for tick in 1..=300u64 {
            session.advance(secs(1));
            assert_eq!(session.remaining_secs(), 300 - tick);
            assert_eq!(session.is_active(), tick < 300, "tick {}", tick);
        }

        let phase = session.phase();
        let countdown = session.phase_countdown();
        let index = session.current_index();
        let completed = session.completed_count();
        assert!(rx.try_iter().any(|e| e == PlayerEvent::SessionExpired));

        // 画面冻结，不再计时
        assert_eq!(session.until_next(), None);
        session.advance(secs(60));
        assert_eq!(session.phase(), phase);
        assert_eq!(session.phase_countdown(), countdown);
        assert_eq!(session.current_index(), index);
        assert_eq!(session.completed_count(), completed);
        assert_eq!(session.remaining_secs(), 0);

        // 300 秒 = 42 轮完整短语 + 6 秒，停在巩固阶段
        assert_eq!(completed, 42);
        assert_eq!(phase, SessionPhase::Reinforcement);
    }

    #[test]
    fn test_expired_session_ignores_controls() {
        let (mut session, rx) = started(3, 5);
        session.advance(secs(300));
        assert!(!session.is_active());
        let frozen = session.snapshot();
        rx.try_iter().for_each(drop);

        session.skip_forward().unwrap();
        session.skip_back().unwrap();
        session.pause_resume().unwrap();
        assert!(!session.is_active());
        assert_eq!(session.snapshot(), frozen);

        // 每个操作仍然回报一次当前快照
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 3);
        assert!(events
            .iter()
            .all(|e| matches!(e, PlayerEvent::Guided(s) if *s == frozen)));
    }

    #[test]
    fn test_budget_follows_config() {
        let config = PlayerConfig {
            session_minutes: vec![1, 30],
            ..Default::default()
        };
        let (tx, _rx) = unbounded();
        let mut session = GuidedSession::new(playlist(2), &config, tx);
        assert!(matches!(session.start(5), Err(PlayerError::InvalidArgument(_))));

        session.start(1).unwrap();
        assert_eq!(session.remaining_secs(), 60);
        session.advance(secs(60));
        assert!(!session.is_active());
        assert_eq!(session.remaining_secs(), 0);
    }

    #[test]
    fn test_pause_freezes_everything() {
        let (mut session, _rx) = started(3, 5);
        session.advance(Duration::from_millis(3500));
        assert_eq!(session.phase(), SessionPhase::PauseForRepeat);
        assert_eq!(session.phase_countdown(), 2);

        session.pause_resume().unwrap();
        assert!(!session.is_active());
        let frozen = session.snapshot();
        session.advance(secs(120));
        assert_eq!(session.snapshot(), frozen);
        assert_eq!(session.until_next(), None);

        session.pause_resume().unwrap();
        assert!(session.is_active());
        // 上一次跟读计时已走过 500ms，再过 500ms 即触发
        assert_eq!(session.until_next(), Some(Duration::from_millis(500)));
        session.advance(Duration::from_millis(500));
        assert_eq!(session.phase_countdown(), 1);
        assert_eq!(session.remaining_secs(), 300 - 4);
    }

    #[test]
    fn test_pause_does_not_restart_listen_phase() {
        let (mut session, _rx) = started(3, 5);
        session.advance(Duration::from_millis(1500));
        session.pause_resume().unwrap();
        session.advance(secs(30));
        session.pause_resume().unwrap();

        session.advance(Duration::from_millis(500));
        assert_eq!(session.phase(), SessionPhase::PauseForRepeat);
    }

    #[test]
    fn test_skip_back_keeps_phase() {
        let (mut session, _rx) = started(3, 5);
        session.advance(secs(7));
        session.advance(secs(3));
        assert_eq!(session.current_index(), 1);
        assert_eq!(session.phase(), SessionPhase::PauseForRepeat);

        session.skip_back().unwrap();
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.phase(), SessionPhase::PauseForRepeat);

        session.skip_back().unwrap();
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn test_skip_forward_restarts_listening_and_clamps() {
        let (mut session, _rx) = started(2, 5);
        session.advance(secs(3));
        assert_eq!(session.phase(), SessionPhase::PauseForRepeat);

        session.skip_forward().unwrap();
        assert_eq!(session.current_index(), 1);
        assert_eq!(session.phase(), SessionPhase::Listening);
        assert_eq!(session.phase_countdown(), 3);
        assert_eq!(session.completed_count(), 0);

        // 最后一条不回绕，但仍重新开始听原句阶段
        session.advance(Duration::from_millis(1000));
        session.skip_forward().unwrap();
        assert_eq!(session.current_index(), 1);
        session.advance(Duration::from_millis(1999));
        assert_eq!(session.phase(), SessionPhase::Listening);
        session.advance(Duration::from_millis(1));
        assert_eq!(session.phase(), SessionPhase::PauseForRepeat);
    }

    #[test]
    fn test_stop_emits_session_ended() {
        let (mut session, rx) = started(3, 10);
        session.advance(secs(4));
        session.stop().unwrap();

        assert!(!session.is_active());
        assert!(!session.is_started());
        assert_eq!(session.until_next(), None);
        assert!(rx.try_iter().any(|e| e == PlayerEvent::SessionEnded));

        session.advance(secs(10));
        assert_eq!(session.remaining_secs(), 600 - 4);
        assert!(matches!(session.pause_resume(), Err(PlayerError::InvalidState(_))));
    }

    #[test]
    fn test_restart_resets_state() {
        let (mut session, _rx) = started(3, 5);
        session.advance(secs(20));
        session.skip_forward().unwrap();
        session.pause_resume().unwrap();

        session.start(10).unwrap();
        assert!(session.is_active());
        assert_eq!(session.remaining_secs(), 600);
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.completed_count(), 0);
        assert_eq!(session.phase(), SessionPhase::Listening);
        assert_eq!(session.until_next(), Some(secs(1)));
    }
}
