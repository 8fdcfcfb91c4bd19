//! lingo-cli - 命令行练习工具
//!
//! 加载短语目录，进行自由播放或限时引导练习（真实时间或逻辑时间模拟）。

mod history;
mod simulate;

use std::io::Write;
use std::path::{Path, PathBuf};

use lingo_player::{
    spawn_player, ConfigError, PlaybackSpeed, PlayerCommand, PlayerConfig, PlayerError,
    PlayerEvent, PlayerHandle,
};
use lingo_playlist::{Playlist, PlaylistError};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use history::PhraseHistory;
use simulate::{simulate_free, simulate_session, FreePlayOptions};

/// 命令行错误
#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("Playlist error: {0}")]
    Playlist(#[from] PlaylistError),
    #[error("Player error: {0}")]
    Player(#[from] PlayerError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Player engine error: {0}")]
    Engine(String),
    #[error("Player engine stopped unexpectedly")]
    EngineGone,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lingo_player=info,lingo_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| "lingo-cli".into());

    if let Err(e) = run(args.get(1..).unwrap_or(&[])) {
        eprintln!("Error: {}", e);
        if let CliError::Usage(_) = e {
            print_usage(&program);
        }
        std::process::exit(1);
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage:");
    eprintln!(
        "  {} simulate-free <playlist.json> <seconds> [--shuffle] [--repeat] [--speed X]",
        program
    );
    eprintln!("  {} simulate-session <playlist.json> <minutes>", program);
    eprintln!("  {} play <playlist.json> [index]", program);
    eprintln!("  {} session <playlist.json> <minutes>", program);
    eprintln!("Options:");
    eprintln!("  --config <config.json>   player config (any position)");
}

/// 从参数中取出 `--config <file>`，返回配置和剩余参数
fn split_config(args: &[String]) -> Result<(PlayerConfig, Vec<String>), CliError> {
    let mut rest = Vec::with_capacity(args.len());
    let mut config_path: Option<PathBuf> = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let path = iter
                .next()
                .ok_or_else(|| CliError::Usage("--config needs a file path".into()))?;
            config_path = Some(PathBuf::from(path));
        } else {
            rest.push(arg.clone());
        }
    }

    let config = match config_path {
        Some(path) => PlayerConfig::load(&path)?,
        None => PlayerConfig::default(),
    };
    Ok((config, rest))
}

fn run(args: &[String]) -> Result<(), CliError> {
    let (config, args) = split_config(args)?;
    let command = args
        .first()
        .ok_or_else(|| CliError::Usage("missing command".into()))?;
    let playlist_path = args
        .get(1)
        .ok_or_else(|| CliError::Usage(format!("{} needs a playlist file", command)))?;
    let playlist = load_playlist(Path::new(playlist_path))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match command.as_str() {
        "simulate-free" => {
            let options = parse_free_options(&args[2..])?;
            let report = simulate_free(playlist, &config, &options, &mut out)?;
            serde_json::to_writer_pretty(&mut out, &report)?;
            writeln!(out)?;
        }
        "simulate-session" => {
            let minutes = parse_number::<u32>(args.get(2), "minutes")?;
            let report = simulate_session(playlist, &config, minutes)?;
            serde_json::to_writer_pretty(&mut out, &report)?;
            writeln!(out)?;
        }
        "play" => {
            let index = match args.get(2) {
                Some(_) => parse_number::<usize>(args.get(2), "index")?,
                None => 0,
            };
            let handle = spawn_player(config)?;
            handle
                .cmd_tx
                .send(PlayerCommand::OpenFreePlay { playlist, index })
                .map_err(|_| CliError::EngineGone)?;
            follow_free_play(&handle, &mut out)?;
            let _ = handle.cmd_tx.send(PlayerCommand::Shutdown);
        }
        "session" => {
            let budget_minutes = parse_number::<u32>(args.get(2), "minutes")?;
            let handle = spawn_player(config)?;
            handle
                .cmd_tx
                .send(PlayerCommand::StartSession {
                    playlist,
                    budget_minutes,
                })
                .map_err(|_| CliError::EngineGone)?;
            follow_session(&handle, &mut out)?;
            let _ = handle.cmd_tx.send(PlayerCommand::Shutdown);
        }
        other => return Err(CliError::Usage(format!("unknown command: {}", other))),
    }

    Ok(())
}

fn load_playlist(path: &Path) -> Result<Playlist, CliError> {
    let playlist = Playlist::load(path)?;
    info!(
        name = playlist.name().unwrap_or("-"),
        phrases = playlist.len(),
        "playlist loaded"
    );
    Ok(playlist)
}

fn parse_number<T: std::str::FromStr>(arg: Option<&String>, what: &str) -> Result<T, CliError> {
    let raw = arg.ok_or_else(|| CliError::Usage(format!("missing {}", what)))?;
    raw.parse()
        .map_err(|_| CliError::Usage(format!("invalid {}: {}", what, raw)))
}

fn parse_free_options(args: &[String]) -> Result<FreePlayOptions, CliError> {
    let mut options = FreePlayOptions {
        seconds: parse_number(args.first(), "seconds")?,
        ..Default::default()
    };

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--shuffle" => options.shuffle = true,
            "--repeat" => options.repeat = true,
            "--speed" => {
                let multiplier: f64 = parse_number(iter.next(), "speed")?;
                options.speed = PlaybackSpeed::try_from(multiplier)?;
            }
            other => return Err(CliError::Usage(format!("unknown option: {}", other))),
        }
    }
    Ok(options)
}

/// 跟随真实时间的自由播放，直到播放列表播完
fn follow_free_play(handle: &PlayerHandle, out: &mut dyn Write) -> Result<(), CliError> {
    let mut history = PhraseHistory::default();
    let mut started = false;

    for event in handle.evt_rx.iter() {
        match event {
            PlayerEvent::PhraseChanged(phrase) => {
                history.record(&phrase);
                serde_json::to_writer(&mut *out, &phrase)?;
                writeln!(out)?;
            }
            PlayerEvent::FreePlay(snapshot) => {
                if snapshot.is_playing {
                    started = true;
                } else if started {
                    serde_json::to_writer(&mut *out, &snapshot)?;
                    writeln!(out)?;
                    info!(listened = history.len(), "playlist finished");
                    return Ok(());
                }
            }
            PlayerEvent::Error(e) => return Err(CliError::Engine(e)),
            _ => {}
        }
    }
    Err(CliError::EngineGone)
}

/// 跟随真实时间的引导练习，直到时间用完
fn follow_session(handle: &PlayerHandle, out: &mut dyn Write) -> Result<(), CliError> {
    let mut history = PhraseHistory::default();
    let mut last_phase = None;

    for event in handle.evt_rx.iter() {
        match event {
            PlayerEvent::PhraseChanged(phrase) => history.record(&phrase),
            PlayerEvent::Guided(snapshot) => {
                // 只在阶段变化时输出，避免每秒刷屏
                if last_phase != Some(snapshot.phase) {
                    last_phase = Some(snapshot.phase);
                    serde_json::to_writer(&mut *out, &snapshot)?;
                    writeln!(out)?;
                }
            }
            PlayerEvent::SessionExpired | PlayerEvent::SessionEnded => {
                let entries: Vec<_> = history.entries().cloned().collect();
                serde_json::to_writer_pretty(&mut *out, &entries)?;
                writeln!(out)?;
                return Ok(());
            }
            PlayerEvent::Error(e) => return Err(CliError::Engine(e)),
            PlayerEvent::FreePlay(_) => {}
        }
    }
    Err(CliError::EngineGone)
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::unbounded;
    use lingo_player::{FreePlaySnapshot, GuidedSnapshot, SessionPhase};
    use lingo_playlist::PhraseRecord;

    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    /// 预先写入事件的句柄，发送端随后关闭
    fn scripted_handle(events: Vec<PlayerEvent>) -> PlayerHandle {
        let (cmd_tx, _cmd_rx) = unbounded();
        let (evt_tx, evt_rx) = unbounded();
        for event in events {
            evt_tx.send(event).unwrap();
        }
        PlayerHandle { cmd_tx, evt_rx }
    }

    fn phrase(id: &str) -> PlayerEvent {
        PlayerEvent::PhraseChanged(PhraseRecord::new(id, "primary", "target"))
    }

    fn free_play(index: usize, is_playing: bool) -> PlayerEvent {
        PlayerEvent::FreePlay(FreePlaySnapshot {
            current_phrase_id: format!("p{}", index),
            current_index: index,
            elapsed_seconds: 0.0,
            duration_seconds: 3.0,
            is_playing,
            shuffle_enabled: false,
            repeat_enabled: false,
            speed_multiplier: 1.0,
        })
    }

    fn guided(phase: SessionPhase, remaining: u64) -> PlayerEvent {
        PlayerEvent::Guided(GuidedSnapshot {
            current_phrase_id: "p0".into(),
            current_index: 0,
            phase,
            phase_countdown: 3,
            session_remaining_seconds: remaining,
            completed_count: 0,
            is_active: remaining > 0,
        })
    }

    fn output(out: Vec<u8>) -> Vec<serde_json::Value> {
        serde_json::Deserializer::from_slice(&out)
            .into_iter::<serde_json::Value>()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_follow_free_play_returns_when_playback_stops() {
        let handle = scripted_handle(vec![
            phrase("p0"),
            free_play(0, false),
            free_play(0, true),
            phrase("p1"),
            free_play(1, true),
            free_play(1, false),
            free_play(1, false),
        ]);
        let mut out = Vec::new();
        follow_free_play(&handle, &mut out).unwrap();

        // 打开时的暂停快照不算结束，只输出最后的停止快照一次
        let values = output(out);
        assert_eq!(values.len(), 3);
        assert_eq!(values[0]["id"], "p0");
        assert_eq!(values[1]["id"], "p1");
        assert_eq!(values[2]["isPlaying"], false);
        assert_eq!(values[2]["currentIndex"], 1);
        assert_eq!(handle.evt_rx.len(), 1);
    }

    #[test]
    fn test_follow_session_prints_phases_and_history() {
        let handle = scripted_handle(vec![
            phrase("p0"),
            guided(SessionPhase::Listening, 300),
            guided(SessionPhase::Listening, 299),
            guided(SessionPhase::PauseForRepeat, 298),
            phrase("p1"),
            guided(SessionPhase::Listening, 293),
            PlayerEvent::SessionExpired,
        ]);
        let mut out = Vec::new();
        follow_session(&handle, &mut out).unwrap();

        let values = output(out);
        assert_eq!(values.len(), 4);
        assert_eq!(values[0]["phase"], "listening");
        assert_eq!(values[1]["phase"], "pauseForRepeat");
        assert_eq!(values[2]["sessionRemainingSeconds"], 293);

        let history = values[3].as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["id"], "p1");
        assert_eq!(history[1]["id"], "p0");
    }

    #[test]
    fn test_follow_reports_engine_error() {
        let handle = scripted_handle(vec![PlayerEvent::Error("bad seek".into())]);
        assert!(matches!(
            follow_free_play(&handle, &mut std::io::sink()),
            Err(CliError::Engine(msg)) if msg == "bad seek"
        ));

        let handle = scripted_handle(vec![
            guided(SessionPhase::Listening, 300),
            PlayerEvent::Error("no guided session is running".into()),
        ]);
        assert!(matches!(
            follow_session(&handle, &mut std::io::sink()),
            Err(CliError::Engine(_))
        ));
    }

    #[test]
    fn test_follow_detects_engine_gone() {
        let handle = scripted_handle(vec![free_play(0, false), free_play(0, true)]);
        assert!(matches!(
            follow_free_play(&handle, &mut std::io::sink()),
            Err(CliError::EngineGone)
        ));

        let handle = scripted_handle(vec![guided(SessionPhase::Listening, 300)]);
        assert!(matches!(
            follow_session(&handle, &mut std::io::sink()),
            Err(CliError::EngineGone)
        ));
    }

    #[test]
    fn test_split_config_without_flag() {
        let (config, rest) = split_config(&args(&["play", "list.json"])).unwrap();
        assert_eq!(config, PlayerConfig::default());
        assert_eq!(rest, args(&["play", "list.json"]));
    }

    #[test]
    fn test_split_config_missing_path() {
        assert!(matches!(
            split_config(&args(&["play", "--config"])),
            Err(CliError::Usage(_))
        ));
    }

    #[test]
    fn test_parse_free_options() {
        let options =
            parse_free_options(&args(&["30", "--repeat", "--speed", "0.75", "--shuffle"])).unwrap();
        assert_eq!(options.seconds, 30);
        assert!(options.repeat);
        assert!(options.shuffle);
        assert_eq!(options.speed, PlaybackSpeed::ThreeQuarters);
    }

    #[test]
    fn test_parse_free_options_rejects_bad_input() {
        assert!(matches!(
            parse_free_options(&args(&["soon"])),
            Err(CliError::Usage(_))
        ));
        assert!(matches!(
            parse_free_options(&args(&["10", "--speed", "2"])),
            Err(CliError::Player(PlayerError::InvalidArgument(_)))
        ));
        assert!(matches!(
            parse_free_options(&args(&["10", "--loud"])),
            Err(CliError::Usage(_))
        ));
    }
}
