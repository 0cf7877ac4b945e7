//! 启动参数
//!
//! 每次 spawn 使用一份不可变的启动参数；启动后修改设置不会影响运行中的会话。

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::session::TermSize;

/// 用户设置
///
/// 目前只包含以环境变量形式注入子进程的 API Key。
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, rename = "apiKeys")]
    pub api_keys: BTreeMap<String, String>,
}

impl Settings {
    pub fn with_api_key(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.api_keys.insert(name.into(), value.into());
        self
    }
}

// API Key 不进日志
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted: BTreeMap<&str, &str> = self
            .api_keys
            .iter()
            .map(|(key, value)| (key.as_str(), if value.is_empty() { "" } else { "***" }))
            .collect();
        f.debug_struct("Settings")
            .field("api_keys", &redacted)
            .finish()
    }
}

/// 启动参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchParams {
    /// 子命令参数
    pub args: Vec<String>,
    /// 用户设置（环境变量来源）
    pub settings: Settings,
    /// 初始终端大小
    pub size: TermSize,
}

impl LaunchParams {
    pub fn new(args: Vec<String>, settings: Settings, size: TermSize) -> Self {
        Self {
            args,
            settings,
            size,
        }
    }
}
