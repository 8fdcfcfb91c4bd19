//! lingo_player - 跟读练习播放调度
//!
//! 提供自由播放与限时引导练习两种控制器，以及驱动它们的逻辑时钟和后台引擎。

mod clock;
mod command;
mod config;
mod engine;
mod free_play;
mod guided;
mod picker;

pub use clock::*;
pub use command::*;
pub use config::*;
pub use engine::*;
pub use free_play::*;
pub use guided::*;
pub use picker::*;

pub use lingo_playlist::{PhraseRecord, Playlist};

/// 播放控制错误
#[derive(thiserror::Error, Debug)]
pub enum PlayerError {
    /// 前置条件不满足（调用方错误）
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    /// 参数不在允许的取值范围内，状态保持不变
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
