//! 宿主事件总线
//!
//! 进程宿主的共享事件通道。所有控制器订阅同一条总线，各自按会话 ID 过滤。
//!
//! ## 功能
//! - 按事件类型（data / status）分别维护订阅者
//! - 每个订阅者一条独立无界队列，慢消费者不会导致其他订阅者丢事件
//! - 订阅被丢弃后，下一次发布时清理对应发送端

use clawrunner_core::{
    EventKind, HostEvent, SessionId, SessionStatus, TerminalDataEvent, TerminalStatusEvent,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::terminal::controller::EventSubscription;

type Subscribers = Mutex<Vec<mpsc::UnboundedSender<HostEvent>>>;

/// 宿主事件总线
#[derive(Debug, Default)]
pub struct HostEventBus {
    data: Subscribers,
    status: Subscribers,
}

impl HostEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn subscribers(&self, kind: EventKind) -> &Subscribers {
        match kind {
            EventKind::Data => &self.data,
            EventKind::Status => &self.status,
        }
    }

    /// 订阅某一类事件
    pub fn subscribe(&self, kind: EventKind) -> EventSubscription {
        let (tx, subscription) = EventSubscription::channel(kind);
        self.subscribers(kind).lock().push(tx);
        tracing::debug!("[HostEventBus] 新订阅: event={}", kind.event_name());
        subscription
    }

    /// 发布事件，返回收到事件的订阅者数量
    pub fn publish(&self, event: impl Into<HostEvent>) -> usize {
        let event = event.into();
        let mut subscribers = self.subscribers(event.kind()).lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        subscribers.len()
    }

    /// 发布输出数据
    pub fn publish_data(&self, session_id: SessionId, data: impl Into<Vec<u8>>) -> usize {
        self.publish(TerminalDataEvent {
            session_id,
            data: data.into(),
        })
    }

    /// 发布状态变更
    pub fn publish_status(
        &self,
        session_id: SessionId,
        status: SessionStatus,
        error_message: Option<String>,
    ) -> usize {
        let event = match (status, error_message) {
            (SessionStatus::Error, Some(message)) => {
                TerminalStatusEvent::error(session_id, message)
            }
            (status, _) => TerminalStatusEvent::new(session_id, status),
        };
        self.publish(event)
    }

    /// 当前存活的订阅者数量
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        let mut subscribers = self.subscribers(kind).lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}
