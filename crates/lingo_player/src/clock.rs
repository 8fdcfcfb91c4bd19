//! 逻辑播放时钟
//!
//! 不依赖音频硬件的周期/单次定时器。定时器触发时返回注册时给出的令牌，
//! 由持有时钟的控制器逐个分发处理，一个处理完成后才取下一个。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 最短周期，避免零周期定时器在同一时刻无限触发
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// 可取消的定时器句柄
///
/// `cancel()` 可重复调用，第二次起为空操作。
#[derive(Debug, Clone)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

struct Timer<T> {
    id: u64,
    due: Duration,
    period: Option<Duration>,
    token: T,
    cancelled: Arc<AtomicBool>,
}

impl<T> Timer<T> {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// 逻辑时钟
///
/// 每个控制器持有自己的实例，实例之间互不影响。
pub struct PlaybackClock<T> {
    now: Duration,
    next_id: u64,
    suspended: bool,
    timers: Vec<Timer<T>>,
}

impl<T: Clone> PlaybackClock<T> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            suspended: false,
            timers: Vec::new(),
        }
    }

    /// 当前逻辑时间
    pub fn now(&self) -> Duration {
        self.now
    }

    /// 注册周期定时器，首次触发在 `interval` 之后
    pub fn start(&mut self, interval: Duration, token: T) -> TimerHandle {
        let interval = interval.max(MIN_INTERVAL);
        self.register(interval, Some(interval), token)
    }

    /// 注册单次定时器
    pub fn once(&mut self, delay: Duration, token: T) -> TimerHandle {
        self.register(delay, None, token)
    }

    fn register(&mut self, delay: Duration, period: Option<Duration>, token: T) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;

        let cancelled = Arc::new(AtomicBool::new(false));
        self.timers.push(Timer {
            id,
            due: self.now + delay,
            period,
            token,
            cancelled: cancelled.clone(),
        });

        TimerHandle { cancelled }
    }

    /// 冻结逻辑时间：挂起期间不触发任何定时器，剩余延时保持不变
    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }

    /// 取消全部定时器
    pub fn clear(&mut self) {
        for timer in self.timers.drain(..) {
            timer.cancelled.store(true, Ordering::Relaxed);
        }
    }

    /// 未取消的定时器数量
    pub fn active_timers(&self) -> usize {
        self.timers.iter().filter(|t| !t.is_cancelled()).count()
    }

    /// 距下一个定时器触发的逻辑时长；挂起或没有定时器时返回 None
    pub fn until_next(&self) -> Option<Duration> {
        if self.suspended {
            return None;
        }
        self.timers
            .iter()
            .filter(|t| !t.is_cancelled())
            .map(|t| t.due.saturating_sub(self.now))
            .min()
    }

    /// 取出 `deadline` 之前最早到期的定时器令牌，并把逻辑时间推进到其到期时刻
    ///
    /// 同一时刻到期的定时器按注册顺序触发。
    pub fn pop_due(&mut self, deadline: Duration) -> Option<T> {
        if self.suspended {
            return None;
        }

        self.timers.retain(|t| !t.is_cancelled());

        let pos = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= deadline)
            .min_by_key(|(_, t)| (t.due, t.id))
            .map(|(pos, _)| pos)?;

        let timer = &mut self.timers[pos];
        self.now = self.now.max(timer.due);
        let token = timer.token.clone();
        let period = timer.period;

        match period {
            Some(period) => self.timers[pos].due += period,
            None => {
                self.timers.swap_remove(pos);
            }
        }

        Some(token)
    }

    /// 在所有到期定时器处理完之后，把逻辑时间推进到 `deadline`
    pub fn settle(&mut self, deadline: Duration) {
        if !self.suspended && deadline > self.now {
            self.now = deadline;
        }
    }
}

impl<T: Clone> Default for PlaybackClock<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for PlaybackClock<T> {
    fn drop(&mut self) {
        for timer in &self.timers {
            timer.cancelled.store(true, Ordering::Relaxed);
        }
    }
}
