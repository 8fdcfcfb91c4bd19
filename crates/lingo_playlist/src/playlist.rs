//! 播放列表
//!
//! 播放列表在会话期间只读，克隆只共享底层数据。

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::{PhraseRecord, PlaylistError};

/// 有序、不可变的短语序列
#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    name: Option<String>,
    phrases: Arc<[PhraseRecord]>,
}

/// 目录文件的两种写法：裸数组，或带名称的对象
#[derive(Deserialize)]
#[serde(untagged)]
enum PlaylistFile {
    Bare(Vec<PhraseRecord>),
    Named {
        #[serde(default)]
        name: Option<String>,
        phrases: Vec<PhraseRecord>,
    },
}

impl Playlist {
    /// 由短语列表创建；校验 id 唯一、时长为正
    pub fn new(phrases: Vec<PhraseRecord>) -> Result<Self, PlaylistError> {
        let mut seen = HashSet::with_capacity(phrases.len());
        for phrase in &phrases {
            if !seen.insert(phrase.id.as_str()) {
                return Err(PlaylistError::DuplicateId(phrase.id.clone()));
            }
            if let Some(value) = phrase.duration_secs {
                if !value.is_finite() || value <= 0.0 {
                    return Err(PlaylistError::InvalidDuration {
                        id: phrase.id.clone(),
                        value,
                    });
                }
            }
        }

        Ok(Self {
            name: None,
            phrases: phrases.into(),
        })
    }

    /// 解析 JSON 目录
    pub fn from_json_str(json: &str) -> Result<Self, PlaylistError> {
        match serde_json::from_str::<PlaylistFile>(json)? {
            PlaylistFile::Bare(phrases) => Self::new(phrases),
            PlaylistFile::Named { name, phrases } => {
                let mut playlist = Self::new(phrases)?;
                playlist.name = name;
                Ok(playlist)
            }
        }
    }

    /// 从文件加载 JSON 目录
    pub fn load(path: &Path) -> Result<Self, PlaylistError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// 最后一个有效索引（空列表返回 None）
    pub fn last_index(&self) -> Option<usize> {
        self.phrases.len().checked_sub(1)
    }

    pub fn get(&self, index: usize) -> Option<&PhraseRecord> {
        self.phrases.get(index)
    }

    pub fn phrases(&self) -> &[PhraseRecord] {
        &self.phrases
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PhraseRecord> {
        self.phrases.iter()
    }
}

impl<'a> IntoIterator for &'a Playlist {
    type Item = &'a PhraseRecord;
    type IntoIter = std::slice::Iter<'a, PhraseRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
