//! 播放引擎
//!
//! 后台线程持有当前界面的控制器，用真实时间驱动其逻辑时钟。
//! 同一时刻只有一个界面（自由播放或引导练习）在运行，切换时先释放旧界面。

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{info, warn};

use crate::{
    FreePlayer, GuidedSession, PlaybackSpeed, PlayerCommand, PlayerConfig, PlayerError,
    PlayerEvent,
};

/// 没有待触发计时时的最长等待
const IDLE_WAIT: Duration = Duration::from_millis(250);
/// 事件通道容量；满时快照被丢弃，短语与会话事件仍等待送达
const EVENT_CAPACITY: usize = 64;

/// 播放引擎句柄
pub struct PlayerHandle {
    pub cmd_tx: Sender<PlayerCommand>,
    pub evt_rx: Receiver<PlayerEvent>,
}

/// 启动播放引擎
pub fn spawn_player(config: PlayerConfig) -> Result<PlayerHandle, PlayerError> {
    config.validate()?;

    let (cmd_tx, cmd_rx) = bounded(32);
    let (evt_tx, evt_rx) = bounded(EVENT_CAPACITY);

    thread::spawn(move || {
        run_engine(cmd_rx, evt_tx, config);
    });

    Ok(PlayerHandle { cmd_tx, evt_rx })
}

fn run_engine(cmd_rx: Receiver<PlayerCommand>, evt_tx: Sender<PlayerEvent>, config: PlayerConfig) {
    let mut state = EngineState::new(config, evt_tx);
    let mut last_tick = Instant::now();

    loop {
        let wait = state.surface.until_next().unwrap_or(IDLE_WAIT).min(IDLE_WAIT);

        match cmd_rx.recv_timeout(wait) {
            Ok(cmd) => {
                // 先结算命令到达前经过的时间
                last_tick = state.catch_up(last_tick);
                if !state.handle_command(cmd) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                last_tick = state.catch_up(last_tick);
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    state.surface = Surface::Idle;
    info!("player engine stopped");
}

/// 当前界面
enum Surface {
    Idle,
    FreePlay(FreePlayer),
    Guided(GuidedSession),
}

impl Surface {
    fn advance(&mut self, by: Duration) {
        match self {
            Surface::Idle => {}
            Surface::FreePlay(player) => player.advance(by),
            Surface::Guided(session) => session.advance(by),
        }
    }

    fn until_next(&self) -> Option<Duration> {
        match self {
            Surface::Idle => None,
            Surface::FreePlay(player) => player.until_next(),
            Surface::Guided(session) => session.until_next(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Surface::Idle => "idle",
            Surface::FreePlay(_) => "free-play",
            Surface::Guided(_) => "guided",
        }
    }
}

struct EngineState {
    config: PlayerConfig,
    evt_tx: Sender<PlayerEvent>,
    surface: Surface,
}

impl EngineState {
    fn new(config: PlayerConfig, evt_tx: Sender<PlayerEvent>) -> Self {
        Self {
            config,
            evt_tx,
            surface: Surface::Idle,
        }
    }

    fn catch_up(&mut self, since: Instant) -> Instant {
        let now = Instant::now();
        self.surface.advance(now.saturating_duration_since(since));
        now
    }

    fn handle_command(&mut self, cmd: PlayerCommand) -> bool {
        if let PlayerCommand::Shutdown = cmd {
            return false;
        }

        if let Err(e) = self.dispatch(cmd) {
            warn!("command rejected: {}", e);
            let _ = self.evt_tx.send(PlayerEvent::Error(e.to_string()));
        }
        true
    }

    fn dispatch(&mut self, cmd: PlayerCommand) -> Result<(), PlayerError> {
        match cmd {
            PlayerCommand::OpenFreePlay { playlist, index } => {
                let mut player =
                    FreePlayer::open(playlist, index, &self.config, self.evt_tx.clone())?;
                player.play();
                self.replace_surface(Surface::FreePlay(player));
            }
            PlayerCommand::Play => self.free_play()?.play(),
            PlayerCommand::Pause => self.free_play()?.pause(),
            PlayerCommand::TogglePlay => self.free_play()?.toggle_play(),
            PlayerCommand::Seek(fraction) => self.free_play()?.seek(fraction)?,
            PlayerCommand::Next => self.free_play()?.next(),
            PlayerCommand::Previous => self.free_play()?.previous(),
            PlayerCommand::SetSpeed(multiplier) => {
                let speed = PlaybackSpeed::try_from(multiplier)?;
                self.free_play()?.set_speed(speed);
            }
            PlayerCommand::ToggleShuffle => self.free_play()?.toggle_shuffle(),
            PlayerCommand::ToggleRepeat => self.free_play()?.toggle_repeat(),
            PlayerCommand::StartSession {
                playlist,
                budget_minutes,
            } => {
                let mut session = GuidedSession::new(playlist, &self.config, self.evt_tx.clone());
                session.start(budget_minutes)?;
                self.replace_surface(Surface::Guided(session));
            }
            PlayerCommand::PauseResumeSession => self.guided()?.pause_resume()?,
            PlayerCommand::StopSession => {
                self.guided()?.stop()?;
                self.replace_surface(Surface::Idle);
            }
            PlayerCommand::SkipBack => self.guided()?.skip_back()?,
            PlayerCommand::SkipForward => self.guided()?.skip_forward()?,
            PlayerCommand::CloseSurface => self.replace_surface(Surface::Idle),
            PlayerCommand::Shutdown => {}
        }
        Ok(())
    }

    /// 旧界面随替换立即释放，其计时全部取消
    fn replace_surface(&mut self, surface: Surface) {
        let old = std::mem::replace(&mut self.surface, surface);
        if !matches!(old, Surface::Idle) || !matches!(self.surface, Surface::Idle) {
            info!(from = old.name(), to = self.surface.name(), "surface switched");
        }
    }

    fn free_play(&mut self) -> Result<&mut FreePlayer, PlayerError> {
        match &mut self.surface {
            Surface::FreePlay(player) => Ok(player),
            _ => Err(PlayerError::InvalidState("no free-play surface is open")),
        }
    }

    fn guided(&mut self) -> Result<&mut GuidedSession, PlayerError> {
        match &mut self.surface {
            Surface::Guided(session) => Ok(session),
            _ => Err(PlayerError::InvalidState("no guided session is open")),
        }
    }
}
