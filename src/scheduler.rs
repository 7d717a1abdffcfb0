//! 重新合成调度器
//!
//! # 设计思路
//!
//! 任何输入变化（源图、画布尺寸、模糊、缩放模式、平滑开关）都会调用
//! `schedule(input)`；只有输入静止满一个延迟周期后才真正触发合成，
//! 连续的变化被合并为一次，并且只使用最后一次的输入。
//!
//! # 实现思路
//!
//! - 调度器只持有一个定时任务句柄：重新调度时先中止旧任务再启动新任务。
//! - “最新输入”放在单个槽位里，触发时取走，保证不会用到中间状态。
//! - 每次调度递增代数，定时任务醒来后核对代数，防止中止与唤醒交错时误触发。
//! - 回调在 tokio 任务中同步执行，调度器本身不关心合成细节。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::AppError;

/// 默认去抖延迟。
pub const DEFAULT_RECOMPUTE_DELAY: Duration = Duration::from_millis(100);

type Sink<I> = dyn Fn(I) + Send + Sync;

/// 尾沿去抖调度器。
pub struct RecomputeScheduler<I: Send + 'static> {
    delay: Duration,
    runtime: Handle,
    sink: Arc<Sink<I>>,
    pending: Arc<Mutex<Option<I>>>,
    generation: Arc<AtomicU64>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl<I: Send + 'static> RecomputeScheduler<I> {
    /// 在当前 tokio 运行时上创建调度器。
    ///
    /// 不在运行时内调用时返回 `AppError::Scheduler`。
    pub fn new<F>(delay: Duration, sink: F) -> Result<Self, AppError>
    where
        F: Fn(I) + Send + Sync + 'static,
    {
        let runtime = Handle::try_current()
            .map_err(|e| AppError::Scheduler(format!("需要在 tokio 运行时中创建调度器：{}", e)))?;

        Ok(Self {
            delay,
            runtime,
            sink: Arc::new(sink),
            pending: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            timer: Mutex::new(None),
        })
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 记录最新输入并重新计时。
    pub fn schedule(&self, input: I) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(input);

        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = timer.take() {
            previous.abort();
        }

        let delay = self.delay;
        let sink = self.sink.clone();
        let pending = self.pending.clone();
        let current_generation = self.generation.clone();

        *timer = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            if current_generation.load(Ordering::SeqCst) != generation {
                return;
            }
            let input = pending.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(input) = input {
                log::debug!("⏱️ 输入已静止 {}ms，触发重新合成（gen={}）", delay.as_millis(), generation);
                sink(input);
            }
        }));

        log::debug!("🔁 已重新计时（gen={}）", generation);
    }

    /// 取消待触发的合成并清空待处理输入。
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(timer) = self.timer.lock().unwrap_or_else(PoisonError::into_inner).take() {
            timer.abort();
            log::debug!("🛑 已取消待触发的重新合成");
        }
    }

    /// 是否有尚未触发的输入。
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl<I: Send + 'static> Drop for RecomputeScheduler<I> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_scheduler(delay_ms: u64) -> (RecomputeScheduler<u32>, Arc<Mutex<Vec<u32>>>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink_fired = fired.clone();
        let scheduler = RecomputeScheduler::new(Duration::from_millis(delay_ms), move |input| {
            sink_fired.lock().expect("lock").push(input);
        })
        .expect("scheduler");
        (scheduler, fired)
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_changes_coalesce_into_last_value() {
        let (scheduler, fired) = recording_scheduler(100);

        for value in 1..=5 {
            scheduler.schedule(value);
            advance(30).await;
        }
        assert!(fired.lock().expect("lock").is_empty());

        advance(100).await;
        assert_eq!(*fired.lock().expect("lock"), vec![5]);
        assert!(!scheduler.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn fires_only_after_full_quiet_period() {
        let (scheduler, fired) = recording_scheduler(100);

        scheduler.schedule(1);
        advance(99).await;
        assert!(fired.lock().expect("lock").is_empty());

        advance(2).await;
        assert_eq!(*fired.lock().expect("lock"), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn separate_bursts_fire_separately() {
        let (scheduler, fired) = recording_scheduler(100);

        scheduler.schedule(1);
        advance(150).await;
        scheduler.schedule(2);
        scheduler.schedule(3);
        advance(150).await;

        assert_eq!(*fired.lock().expect("lock"), vec![1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_input() {
        let (scheduler, fired) = recording_scheduler(100);

        scheduler.schedule(7);
        advance(50).await;
        scheduler.cancel();
        advance(200).await;

        assert!(fired.lock().expect("lock").is_empty());
        assert!(!scheduler.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_scheduler_aborts_timer() {
        let (scheduler, fired) = recording_scheduler(100);
        scheduler.schedule(9);
        drop(scheduler);
        advance(200).await;
        assert!(fired.lock().expect("lock").is_empty());
    }

    #[test]
    fn creation_outside_runtime_fails() {
        let result = RecomputeScheduler::<u32>::new(DEFAULT_RECOMPUTE_DELAY, |_| {});
        assert!(matches!(result, Err(AppError::Scheduler(_))));
    }
}
