//! 事件路由器
//!
//! 对每个入站事件判定：缓冲、转发或丢弃。
//!
//! - 会话 ID 尚未分配：缓冲（按事件类型分别保持到达顺序）
//! - 已分配且 ID 匹配：转发
//! - 已分配但 ID 不匹配：静默丢弃（已销毁会话的残留事件）
//! - spawn 失败后：一律丢弃

use std::collections::VecDeque;

use clawrunner_core::{SessionId, TerminalDataEvent, TerminalStatusEvent};

/// 路由判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Buffer,
    Forward,
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouterState {
    /// 等待 spawn 结果
    Pending,
    /// 已分配当前会话
    Assigned(SessionId),
    /// spawn 失败或已关闭，不再接受任何事件
    Closed,
}

/// 分配会话 ID 后需要补发的缓冲事件
#[derive(Debug, Default)]
pub struct Drained {
    pub data: Vec<TerminalDataEvent>,
    pub status: Vec<TerminalStatusEvent>,
    /// 因 ID 不匹配被丢弃的缓冲事件数
    pub discarded: usize,
}

/// 事件路由器（每个控制器实例一个）
#[derive(Debug)]
pub struct EventRouter {
    state: RouterState,
    pending_data: VecDeque<TerminalDataEvent>,
    pending_status: VecDeque<TerminalStatusEvent>,
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRouter {
    pub fn new() -> Self {
        Self {
            state: RouterState::Pending,
            pending_data: VecDeque::new(),
            pending_status: VecDeque::new(),
        }
    }

    /// 当前会话 ID
    pub fn current(&self) -> Option<SessionId> {
        match self.state {
            RouterState::Assigned(id) => Some(id),
            _ => None,
        }
    }

    /// 缓冲中的事件数
    pub fn pending_len(&self) -> usize {
        self.pending_data.len() + self.pending_status.len()
    }

    /// 对带有指定会话 ID 的事件做路由判定
    pub fn route(&self, tag: SessionId) -> Route {
        match self.state {
            RouterState::Pending => Route::Buffer,
            RouterState::Assigned(current) if current == tag => Route::Forward,
            RouterState::Assigned(_) | RouterState::Closed => Route::Drop,
        }
    }

    /// 提交数据事件，返回需要立即转发的事件
    pub fn offer_data(&mut self, event: TerminalDataEvent) -> Option<TerminalDataEvent> {
        match self.route(event.session_id) {
            Route::Buffer => {
                self.pending_data.push_back(event);
                None
            }
            Route::Forward => Some(event),
            Route::Drop => None,
        }
    }

    /// 提交状态事件，返回需要立即转发的事件
    pub fn offer_status(&mut self, event: TerminalStatusEvent) -> Option<TerminalStatusEvent> {
        match self.route(event.session_id) {
            Route::Buffer => {
                self.pending_status.push_back(event);
                None
            }
            Route::Forward => Some(event),
            Route::Drop => None,
        }
    }

    /// 分配会话 ID
    ///
    /// 取出所有缓冲事件：ID 匹配的按原顺序返回，其余丢弃。之后停止缓冲。
    /// 只有 Pending 状态下的第一次分配生效。
    pub fn assign(&mut self, session_id: SessionId) -> Drained {
        if self.state != RouterState::Pending {
            return Drained::default();
        }
        self.state = RouterState::Assigned(session_id);

        let mut drained = Drained::default();
        for event in self.pending_data.drain(..) {
            if event.session_id == session_id {
                drained.data.push(event);
            } else {
                drained.discarded += 1;
            }
        }
        for event in self.pending_status.drain(..) {
            if event.session_id == session_id {
                drained.status.push(event);
            } else {
                drained.discarded += 1;
            }
        }
        drained
    }

    /// 关闭路由器并丢弃全部缓冲，返回丢弃数量
    pub fn close(&mut self) -> usize {
        self.state = RouterState::Closed;
        let discarded = self.pending_len();
        self.pending_data.clear();
        self.pending_status.clear();
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawrunner_core::SessionStatus;

    fn sid(raw: u64) -> SessionId {
        SessionId::new(raw).unwrap()
    }

    fn data(raw: u64, bytes: &[u8]) -> TerminalDataEvent {
        TerminalDataEvent {
            session_id: sid(raw),
            data: bytes.to_vec(),
        }
    }

    #[test]
    fn test_route_before_assignment_buffers() {
        let router = EventRouter::new();
        assert_eq!(router.route(sid(1)), Route::Buffer);
        assert!(router.current().is_none());
    }

    #[test]
    fn test_route_after_assignment() {
        let mut router = EventRouter::new();
        router.assign(sid(9));
        assert_eq!(router.route(sid(9)), Route::Forward);
        assert_eq!(router.route(sid(7)), Route::Drop);
        assert_eq!(router.current(), Some(sid(9)));
    }

    #[test]
    fn test_assign_drains_matching_in_order() {
        let mut router = EventRouter::new();
        assert!(router.offer_data(data(5, b"a")).is_none());
        assert!(router.offer_data(data(4, b"stale")).is_none());
        assert!(router.offer_data(data(5, b"b")).is_none());
        assert!(router
            .offer_status(TerminalStatusEvent::new(sid(5), SessionStatus::Stopped))
            .is_none());
        assert_eq!(router.pending_len(), 4);

        let drained = router.assign(sid(5));
        let bytes: Vec<u8> = drained.data.iter().flat_map(|e| e.data.clone()).collect();
        assert_eq!(bytes, b"ab");
        assert_eq!(drained.status.len(), 1);
        assert_eq!(drained.discarded, 1);
        assert_eq!(router.pending_len(), 0);
    }

    #[test]
    fn test_forward_after_assignment_is_immediate() {
        let mut router = EventRouter::new();
        router.assign(sid(2));
        assert_eq!(router.offer_data(data(2, b"x")), Some(data(2, b"x")));
        assert!(router.offer_data(data(3, b"y")).is_none());
        assert_eq!(router.pending_len(), 0);
    }

    #[test]
    fn test_second_assignment_is_ignored() {
        let mut router = EventRouter::new();
        router.assign(sid(2));
        let drained = router.assign(sid(3));
        assert!(drained.data.is_empty());
        assert_eq!(router.current(), Some(sid(2)));
    }

    #[test]
    fn test_close_discards_and_drops_everything() {
        let mut router = EventRouter::new();
        router.offer_data(data(1, b"a"));
        router.offer_status(TerminalStatusEvent::new(sid(1), SessionStatus::Running));
        assert_eq!(router.close(), 2);
        assert_eq!(router.route(sid(1)), Route::Drop);
        assert!(router.offer_data(data(1, b"b")).is_none());
        assert!(router.assign(sid(1)).data.is_empty());
        assert!(router.current().is_none());
    }
}
