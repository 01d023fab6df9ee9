use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::task::{task_tracker::TaskTrackerToken, TaskTracker};

/// 后台任务计数器
///
/// 每个后台任务在开始前领取一个[`InFlight`]，
/// 令牌被释放（无论成功、失败还是panic）时计数减一，
/// 因此计数永远不会为负。
#[derive(Clone, Default)]
pub struct CompletionTracker {
    inner: TaskTracker,
}

/// 一个正在进行中的后台任务
#[derive(Debug)]
pub struct InFlight(#[allow(dead_code)] TaskTrackerToken);

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 计数加一，令牌释放时减一
    pub fn begin(&self) -> InFlight {
        InFlight(self.inner.token())
    }

    /// 在计数内运行一个异步任务
    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.inner.spawn(task)
    }

    pub fn in_flight(&self) -> usize {
        self.inner.len()
    }

    pub fn is_draining(&self) -> bool {
        self.inner.is_closed()
    }

    /// 进入排空状态，直到计数归零才返回
    pub async fn drain(&self) {
        self.inner.close();
        self.inner.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::CompletionTracker;

    #[test]
    fn tokens_increment_and_decrement() {
        let tracker = CompletionTracker::new();
        assert_eq!(tracker.in_flight(), 0);

        let first = tracker.begin();
        let second = tracker.begin();
        assert_eq!(tracker.in_flight(), 2);

        drop(first);
        assert_eq!(tracker.in_flight(), 1);
        drop(second);
        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test]
    async fn drain_returns_immediately_when_idle() {
        let tracker = CompletionTracker::new();
        tokio::time::timeout(Duration::from_millis(100), tracker.drain())
            .await
            .expect("idle tracker should drain at once.");
        assert!(tracker.is_draining());
    }

    #[tokio::test]
    async fn drain_blocks_until_last_token_is_released() {
        let tracker = CompletionTracker::new();
        let token = tracker.begin();

        let draining = tracker.clone();
        let mut drain = tokio::spawn(async move { draining.drain().await });

        // 仍有任务在进行中
        let res = tokio::time::timeout(Duration::from_millis(100), &mut drain).await;
        assert!(res.is_err());

        drop(token);
        tokio::time::timeout(Duration::from_secs(1), drain)
            .await
            .expect("drain should finish once the counter hits zero.")
            .unwrap();
        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test]
    async fn panicking_task_still_decrements() {
        let tracker = CompletionTracker::new();
        let handle = tracker.spawn(async { panic!("boom") });
        assert!(handle.await.is_err());
        assert_eq!(tracker.in_flight(), 0);
    }
}
