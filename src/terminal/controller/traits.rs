//! 控制器边界 trait 定义
//!
//! 会话控制器通过两个窄接口与外部协作者交互：
//! - `ProcessHost` - 进程宿主（spawn/write/resize/kill + 事件订阅）
//! - `TerminalSurface` - 终端渲染面（输出写入、焦点）

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use clawrunner_core::{EventKind, HostEvent, LaunchParams, SessionId, TermSize};
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::terminal::TerminalError;

/// 事件订阅
///
/// 每个订阅者拥有独立的无界队列，不会因消费慢而丢事件。
/// 丢弃订阅即取消订阅。
pub struct EventSubscription {
    kind: EventKind,
    rx: mpsc::UnboundedReceiver<HostEvent>,
}

impl EventSubscription {
    /// 创建订阅及其发送端
    pub fn channel(kind: EventKind) -> (mpsc::UnboundedSender<HostEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { kind, rx })
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// 接收下一个事件，宿主关闭后返回 None
    pub async fn recv(&mut self) -> Option<HostEvent> {
        self.rx.recv().await
    }
}

impl fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSubscription")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// 进程宿主 trait
///
/// 拥有 PTY 子进程，所有操作以会话 ID 为键。
/// 事件通过单一共享通道推送给所有订阅者，由各控制器自行按会话 ID 过滤。
#[async_trait]
pub trait ProcessHost: Send + Sync {
    /// 启动会话，返回宿主分配的会话 ID
    async fn spawn(&self, params: LaunchParams) -> Result<SessionId, TerminalError>;

    /// 写入输入数据
    async fn write(&self, session_id: SessionId, data: &[u8]) -> Result<(), TerminalError>;

    /// 调整终端大小
    async fn resize(&self, session_id: SessionId, size: TermSize) -> Result<(), TerminalError>;

    /// 终止会话（尽力而为，会话可能已退出）
    async fn kill(&self, session_id: SessionId) -> Result<(), TerminalError>;

    /// 订阅某一类事件
    async fn subscribe(&self, kind: EventKind) -> Result<EventSubscription, TerminalError>;
}

/// 终端渲染面 trait
pub trait TerminalSurface: Send + Sync {
    /// 写入输出数据
    fn write_output(&self, data: &[u8]);

    /// 获取输入焦点
    fn focus(&self) {}

    /// 释放输入焦点
    fn blur(&self) {}
}

/// 输出槽
///
/// 保存当前渲染面引用。事件处理路径每次转发前读取，替换后下一块输出即生效。
#[derive(Clone)]
pub struct OutputSlot {
    surface: Arc<RwLock<Arc<dyn TerminalSurface>>>,
}

impl OutputSlot {
    pub fn new(surface: Arc<dyn TerminalSurface>) -> Self {
        Self {
            surface: Arc::new(RwLock::new(surface)),
        }
    }

    /// 替换渲染面
    pub fn replace(&self, surface: Arc<dyn TerminalSurface>) {
        *self.surface.write() = surface;
    }

    /// 获取当前渲染面
    pub fn current(&self) -> Arc<dyn TerminalSurface> {
        self.surface.read().clone()
    }

    pub fn write_output(&self, data: &[u8]) {
        self.current().write_output(data);
    }
}

impl fmt::Debug for OutputSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSlot").finish_non_exhaustive()
    }
}
