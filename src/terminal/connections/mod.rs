//! 连接模块
//!
//! 提供进程宿主的本地实现。
//!
//! ## 模块结构
//! - `event_bus` - 宿主事件总线（data / status 扇出）
//! - `launcher` - 子进程命令构建（参数白名单、环境隔离）
//! - `local_pty` - 本地 PTY 进程宿主

pub mod event_bus;
pub mod launcher;
pub mod local_pty;

pub use event_bus::HostEventBus;
pub use launcher::{
    default_state_dir, is_allowed_env_key, CommandLauncher, LauncherConfig, DEFAULT_ALLOWED_ARGS,
    PASSTHROUGH_ENV_VARS,
};
pub use local_pty::{PtyProcessHost, MAX_WRITE_SIZE};
