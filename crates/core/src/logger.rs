//! 日志管理模块
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// 默认过滤级别，`RUST_LOG` 存在时以其为准
    pub level: String,
    /// 是否输出 ANSI 颜色
    pub ansi: bool,
    /// 是否输出 target
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
            with_target: false,
        }
    }
}

/// 初始化全局 tracing 订阅者
///
/// 重复调用是安全的，已初始化时返回 false。
pub fn init_tracing(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let initialized = fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(config.with_target)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();
    if initialized {
        tracing::debug!("[Logger] 日志系统已初始化: level={}", config.level);
    }
    initialized
}

/// 日志脱敏
///
/// 覆盖 Bearer token 与 `XXX_API_KEY=value` 形式的键值。
pub fn sanitize_log_message(message: &str) -> String {
    let mut sanitized = message.to_string();

    if let Some(pos) = sanitized.find("Bearer ") {
        let start = pos + 7;
        let end = sanitized[start..]
            .find(|c: char| c.is_whitespace() || c == '"' || c == '\'')
            .map_or(sanitized.len(), |offset| start + offset);
        sanitized.replace_range(start..end, "***");
    }

    let mut search_from = 0;
    while let Some(found) = sanitized[search_from..].find("_API_KEY=") {
        let start = search_from + found + "_API_KEY=".len();
        let end = sanitized[start..]
            .find(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == ',')
            .map_or(sanitized.len(), |offset| start + offset);
        if end > start {
            sanitized.replace_range(start..end, "***");
        }
        search_from = start;
    }

    sanitized
}
