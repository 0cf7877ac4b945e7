//! 会话控制器模块
//!
//! 每个终端标签页一个控制器实例，负责一个 PTY 会话的完整生命周期。
//!
//! ## 模块结构
//! - `traits` - 进程宿主与渲染面接口
//! - `router` - 按会话 ID 缓冲/转发/丢弃事件
//! - `status` - 会话状态机与状态观察者
//! - `session_controller` - 启动协议与销毁
//! - `tab` - 尺寸防抖、激活切换、重启
//! - `registry` - 标签页注册表

mod registry;
mod router;
mod session_controller;
mod status;
mod tab;
mod traits;

pub use registry::{SharedTab, TabRegistry};
pub use router::{Drained, EventRouter, Route};
pub use session_controller::{SessionController, SessionInput};
pub use status::{can_transition, StatusTracker};
pub use tab::{TabOptions, TerminalTab, DEFAULT_RESIZE_DEBOUNCE};
pub use traits::{EventSubscription, OutputSlot, ProcessHost, TerminalSurface};
