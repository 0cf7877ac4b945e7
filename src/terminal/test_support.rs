//! 测试辅助
//!
//! 脚本化的进程宿主：spawn 结果由测试手动释放，用于构造任意时序。

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clawrunner_core::{
    EventKind, LaunchParams, SessionId, TerminalDataEvent, TerminalStatusEvent, TermSize,
};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::terminal::connections::HostEventBus;
use crate::terminal::controller::{EventSubscription, ProcessHost, TerminalSurface};
use crate::terminal::TerminalError;

pub fn sid(raw: u64) -> SessionId {
    SessionId::new(raw).unwrap()
}

/// 宿主调用记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Subscribe(EventKind),
    Spawn(TermSize),
    Write(SessionId, Vec<u8>),
    Resize(SessionId, TermSize),
    Kill(SessionId),
}

type SpawnReply = oneshot::Sender<Result<SessionId, TerminalError>>;
type SpawnHook = Box<dyn FnOnce() + Send>;

/// 脚本化宿主
#[derive(Default)]
pub struct ScriptedHost {
    bus: HostEventBus,
    calls: Mutex<Vec<HostCall>>,
    spawned_params: Mutex<Vec<LaunchParams>>,
    pending_spawns: Mutex<VecDeque<SpawnReply>>,
    /// 非空时 spawn 立即依次返回这些 ID
    auto_ids: Mutex<VecDeque<u64>>,
    fail_subscribe: AtomicBool,
    /// 下一次 spawn 返回前执行
    spawn_hook: Mutex<Option<SpawnHook>>,
}

impl ScriptedHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// spawn 立即按顺序返回给定 ID
    pub fn with_auto_ids(ids: impl IntoIterator<Item = u64>) -> Arc<Self> {
        let host = Self::default();
        host.auto_ids.lock().extend(ids);
        Arc::new(host)
    }

    /// 在下一次 spawn 返回结果之前执行 `hook`（与返回处于同一次 poll）
    pub fn on_next_spawn(&self, hook: impl FnOnce() + Send + 'static) {
        *self.spawn_hook.lock() = Some(Box::new(hook));
    }

    pub fn fail_subscriptions(&self) {
        self.fail_subscribe.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    pub fn spawned_params(&self) -> Vec<LaunchParams> {
        self.spawned_params.lock().clone()
    }

    pub fn kills(&self) -> Vec<SessionId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HostCall::Kill(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn resizes(&self) -> Vec<TermSize> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HostCall::Resize(_, size) => Some(size),
                _ => None,
            })
            .collect()
    }

    pub fn writes(&self) -> Vec<(SessionId, Vec<u8>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HostCall::Write(id, data) => Some((id, data)),
                _ => None,
            })
            .collect()
    }

    pub fn spawn_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, HostCall::Spawn(_)))
            .count()
    }

    pub fn pending_spawns(&self) -> usize {
        self.pending_spawns.lock().len()
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.bus.subscriber_count(kind)
    }

    /// 释放最早一个等待中的 spawn
    pub fn resolve_spawn(&self, result: Result<SessionId, TerminalError>) {
        let reply = self
            .pending_spawns
            .lock()
            .pop_front()
            .expect("no pending spawn to resolve");
        let _ = reply.send(result);
    }

    /// 等待控制器发起 spawn（此时订阅已建立）
    pub async fn wait_for_spawn(&self) {
        wait_until(|| self.pending_spawns() > 0).await;
    }

    pub fn emit_data(&self, raw_id: u64, data: &[u8]) {
        self.bus.publish(TerminalDataEvent {
            session_id: sid(raw_id),
            data: data.to_vec(),
        });
    }

    pub fn emit_status(&self, raw_id: u64, status: &str) {
        self.bus.publish(TerminalStatusEvent {
            session_id: sid(raw_id),
            status: status.to_string(),
            error_message: None,
        });
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl ProcessHost for ScriptedHost {
    async fn spawn(&self, params: LaunchParams) -> Result<SessionId, TerminalError> {
        self.record(HostCall::Spawn(params.size));
        self.spawned_params.lock().push(params);

        let hook = self.spawn_hook.lock().take();
        if let Some(hook) = hook {
            hook();
        }

        if let Some(raw) = self.auto_ids.lock().pop_front() {
            return Ok(sid(raw));
        }

        let (tx, rx) = oneshot::channel();
        self.pending_spawns.lock().push_back(tx);
        rx.await
            .unwrap_or_else(|_| Err(TerminalError::Internal("spawn abandoned".to_string())))
    }

    async fn write(&self, session_id: SessionId, data: &[u8]) -> Result<(), TerminalError> {
        self.record(HostCall::Write(session_id, data.to_vec()));
        Ok(())
    }

    async fn resize(&self, session_id: SessionId, size: TermSize) -> Result<(), TerminalError> {
        self.record(HostCall::Resize(session_id, size));
        Ok(())
    }

    async fn kill(&self, session_id: SessionId) -> Result<(), TerminalError> {
        self.record(HostCall::Kill(session_id));
        Ok(())
    }

    async fn subscribe(&self, kind: EventKind) -> Result<EventSubscription, TerminalError> {
        self.record(HostCall::Subscribe(kind));
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(TerminalError::SubscriptionFailed("bus unavailable".to_string()));
        }
        Ok(self.bus.subscribe(kind))
    }
}

/// 记录输出与焦点变化的渲染面
#[derive(Default)]
pub struct RecordingSurface {
    output: Mutex<Vec<u8>>,
    focus_count: AtomicUsize,
    blur_count: AtomicUsize,
}

impl RecordingSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn output(&self) -> Vec<u8> {
        self.output.lock().clone()
    }

    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output()).into_owned()
    }

    pub fn focus_count(&self) -> usize {
        self.focus_count.load(Ordering::SeqCst)
    }

    pub fn blur_count(&self) -> usize {
        self.blur_count.load(Ordering::SeqCst)
    }
}

impl TerminalSurface for RecordingSurface {
    fn write_output(&self, data: &[u8]) {
        self.output.lock().extend_from_slice(data);
    }

    fn focus(&self) {
        self.focus_count.fetch_add(1, Ordering::SeqCst);
    }

    fn blur(&self) {
        self.blur_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// 轮询等待条件成立，超时则 panic
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let polled = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "condition not met within 5s");
}

/// 在后台事件全部处理完后再断言
///
/// 让出足够多次调度，使控制器任务和输入任务处理完已入队的消息。
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// 带超时地等待 future 完成
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("future did not complete within 5s")
}
