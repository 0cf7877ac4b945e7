//! clawrunner
//!
//! 为 agent CLI 标签页提供 PTY 会话控制：启动、事件路由、输入与尺寸转发、销毁。
//!
//! ## 模块结构
//! - `config` - 应用配置（默认值 + 环境变量）
//! - `terminal` - 会话控制器与本地 PTY 宿主

pub mod config;
pub mod terminal;

pub use config::AppConfig;
