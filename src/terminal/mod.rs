//! 终端核心模块
//!
//! 管理终端标签页背后的 PTY 会话：启动、事件路由、输入与尺寸转发、销毁。
//!
//! ## 模块结构
//! - `error` - 错误类型定义
//! - `controller` - 会话控制器（启动协议、事件路由、状态机、标签页适配、注册表）
//! - `connections` - 进程宿主实现（事件总线、命令构建、本地 PTY）
//!
//! ## 使用示例
//! ```ignore
//! use clawrunner_lib::terminal::{CommandLauncher, PtyProcessHost, TabOptions, TabRegistry};
//!
//! let host = Arc::new(PtyProcessHost::new(CommandLauncher::default()));
//! let registry = TabRegistry::new(host, TabOptions::default());
//! let (tab_id, tab) = registry.open_tab(surface).await;
//! tab.lock().await.on_size_changed(120, 40)?;
//! ```

pub mod connections;
pub mod controller;
pub mod error;

#[cfg(test)]
mod test_support;

// 重新导出常用类型
pub use connections::{CommandLauncher, HostEventBus, LauncherConfig, PtyProcessHost};
pub use controller::{
    EventRouter, EventSubscription, OutputSlot, ProcessHost, SessionController, SessionInput,
    StatusTracker, TabOptions, TabRegistry, TerminalSurface, TerminalTab,
};
pub use error::TerminalError;
