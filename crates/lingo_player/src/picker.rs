//! 随机播放的索引选择

use rand::Rng;

/// 随机索引来源
pub trait IndexPicker: Send {
    /// 返回 `[0, len)` 内均匀分布的索引，`len` 至少为 1
    fn pick(&mut self, len: usize) -> usize;
}

/// 基于线程本地随机数生成器的选择器
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadIndexPicker;

impl ThreadIndexPicker {
    pub fn new() -> Self {
        Self
    }
}

impl IndexPicker for ThreadIndexPicker {
    fn pick(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        rand::thread_rng().gen_range(0..len)
    }
}
