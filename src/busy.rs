//! 加载状态标志
//!
//! # 设计思路
//!
//! 宿主 UI 需要一个“正在加载”的布尔信号来显示/隐藏加载指示器。
//! 导入流程在解码前后置位/清除该标志。
//!
//! # 实现思路
//!
//! - 标志使用 `AtomicUsize` 计数：并发的两次导入不会让先结束的一方提前清掉标志。
//! - `BusyGuard` 采用 RAII 模式：构造时加一，`Drop` 时减一，
//!   即使解码失败提前返回也能正确恢复。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 可克隆的共享加载标志。
#[derive(Debug, Clone, Default)]
pub struct BusyFlag {
    active: Arc<AtomicUsize>,
}

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.active.load(Ordering::SeqCst) > 0
    }

    /// 置位并返回守卫，守卫离开作用域时自动清除。
    ///
    /// # 示例
    /// ```rust
    /// use albedo_cropper::busy::BusyFlag;
    ///
    /// let flag = BusyFlag::new();
    /// {
    ///     let _guard = flag.enter();
    ///     assert!(flag.is_busy());
    /// }
    /// assert!(!flag.is_busy());
    /// ```
    pub fn enter(&self) -> BusyGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        log::debug!("⏳ 加载标志已置位");
        BusyGuard {
            active: self.active.clone(),
        }
    }
}

/// 加载标志的 RAII 守卫
pub struct BusyGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let previous = self.active.fetch_sub(1, Ordering::SeqCst);
        if previous == 1 {
            log::debug!("✅ 加载标志已清除");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_clears_flag_on_drop() {
        let flag = BusyFlag::new();
        assert!(!flag.is_busy());
        let guard = flag.enter();
        assert!(flag.is_busy());
        drop(guard);
        assert!(!flag.is_busy());
    }

    #[test]
    fn overlapping_guards_keep_flag_until_last_drop() {
        let flag = BusyFlag::new();
        let first = flag.enter();
        let second = flag.clone().enter();
        drop(first);
        assert!(flag.is_busy());
        drop(second);
        assert!(!flag.is_busy());
    }

    #[test]
    fn flag_clears_when_work_fails() {
        let flag = BusyFlag::new();
        let work = || -> Result<(), String> {
            let _guard = flag.enter();
            Err("decode failed".to_string())
        };
        assert!(work().is_err());
        assert!(!flag.is_busy());
    }
}
