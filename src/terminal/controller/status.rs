//! 会话状态机
//!
//! `starting → running → {stopped, error}`，`starting` 也可直接进入终态
//! （spawn 失败、进程秒退）。终态不再迁移；回到 `starting` 只能通过替换整个控制器实例。

use clawrunner_core::{ControllerStatus, SessionStatus};
use tokio::sync::watch;

/// 判断状态迁移是否合法
pub fn can_transition(from: SessionStatus, to: SessionStatus) -> bool {
    use SessionStatus::*;

    match (from, to) {
        (_, Starting) => false,
        (Starting, Running | Stopped | Error) => true,
        (Running, Stopped | Error) => true,
        _ => false,
    }
}

/// 状态跟踪器
///
/// 持有状态观察者通道，每次合法迁移都会推送新的快照。
#[derive(Debug)]
pub struct StatusTracker {
    tx: watch::Sender<ControllerStatus>,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ControllerStatus::default());
        Self { tx }
    }

    /// 订阅状态变更
    pub fn subscribe(&self) -> watch::Receiver<ControllerStatus> {
        self.tx.subscribe()
    }

    /// 当前状态
    pub fn current(&self) -> SessionStatus {
        self.tx.borrow().status
    }

    /// 尝试迁移到新状态，非法迁移被忽略并返回 false
    pub fn transition(&self, next: SessionStatus, error_message: Option<String>) -> bool {
        let current = self.current();
        if !can_transition(current, next) {
            tracing::debug!(
                "[StatusTracker] 忽略状态迁移: {} -> {}",
                current,
                next
            );
            return false;
        }

        let snapshot = if next == SessionStatus::Error {
            ControllerStatus::error(error_message)
        } else {
            ControllerStatus::new(next)
        };
        self.tx.send_replace(snapshot);
        true
    }
}
