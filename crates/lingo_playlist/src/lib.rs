//! lingo_playlist - 短语播放列表
//!
//! 提供双语短语记录与只读播放列表，以及从 JSON 目录文件加载的功能。

mod phrase;
mod playlist;

pub use phrase::*;
pub use playlist::*;

/// 播放列表错误
#[derive(thiserror::Error, Debug)]
pub enum PlaylistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate phrase id: {0}")]
    DuplicateId(String),

    #[error("Invalid duration for phrase {id}: {value}")]
    InvalidDuration { id: String, value: f64 },
}
