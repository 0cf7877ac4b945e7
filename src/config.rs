//! 应用配置
//!
//! 默认值 + `CLAWRUNNER_*` 环境变量覆盖。
//!
//! | 变量 | 含义 |
//! |------|------|
//! | `CLAWRUNNER_PROGRAM` | 运行时可执行文件 |
//! | `CLAWRUNNER_ENTRY` | 入口脚本 |
//! | `CLAWRUNNER_STATE_DIR` | 子进程状态目录 |
//! | `CLAWRUNNER_RESIZE_DEBOUNCE_MS` | 尺寸防抖窗口（毫秒） |
//! | `CLAWRUNNER_LOG` | 默认日志级别（`RUST_LOG` 优先） |

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clawrunner_core::{LogConfig, Settings};
use serde::{Deserialize, Serialize};

use crate::terminal::controller::{TabOptions, DEFAULT_RESIZE_DEBOUNCE};
use crate::terminal::LauncherConfig;

pub const ENV_PROGRAM: &str = "CLAWRUNNER_PROGRAM";
pub const ENV_ENTRY: &str = "CLAWRUNNER_ENTRY";
pub const ENV_STATE_DIR: &str = "CLAWRUNNER_STATE_DIR";
pub const ENV_RESIZE_DEBOUNCE_MS: &str = "CLAWRUNNER_RESIZE_DEBOUNCE_MS";
pub const ENV_LOG: &str = "CLAWRUNNER_LOG";

/// 应用配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub launcher: LauncherConfig,
    /// 尺寸防抖窗口（毫秒）
    pub resize_debounce_ms: u64,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            launcher: LauncherConfig::default(),
            resize_debounce_ms: DEFAULT_RESIZE_DEBOUNCE.as_millis() as u64,
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从进程环境变量加载
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源加载，未设置或为空的变量保留默认值
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(program) = get(ENV_PROGRAM) {
            config.launcher.program = PathBuf::from(program);
        }
        if let Some(entry) = get(ENV_ENTRY) {
            config.launcher.entry = Some(PathBuf::from(entry));
        }
        if let Some(state_dir) = get(ENV_STATE_DIR) {
            config.launcher.state_dir = Some(PathBuf::from(state_dir));
        }
        if let Some(raw) = get(ENV_RESIZE_DEBOUNCE_MS) {
            config.resize_debounce_ms = raw
                .trim()
                .parse()
                .with_context(|| format!("{} 不是有效的毫秒数: {}", ENV_RESIZE_DEBOUNCE_MS, raw))?;
        }
        if let Some(level) = get(ENV_LOG) {
            config.log.level = level;
        }

        Ok(config)
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }

    /// 新标签页的启动选项
    pub fn tab_options(&self, args: Vec<String>, settings: Settings) -> TabOptions {
        TabOptions {
            args,
            settings,
            resize_debounce: self.resize_debounce(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.resize_debounce(), Duration::from_millis(50));
        assert_eq!(config.launcher.program, PathBuf::from("node"));
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            (ENV_PROGRAM, "/opt/node/bin/node"),
            (ENV_ENTRY, "/opt/openclaw/openclaw.mjs"),
            (ENV_STATE_DIR, "/tmp/claw-state"),
            (ENV_RESIZE_DEBOUNCE_MS, " 120 "),
            (ENV_LOG, "debug"),
        ]))
        .unwrap();

        assert_eq!(config.launcher.program, PathBuf::from("/opt/node/bin/node"));
        assert_eq!(
            config.launcher.entry,
            Some(PathBuf::from("/opt/openclaw/openclaw.mjs"))
        );
        assert_eq!(config.launcher.state_dir, Some(PathBuf::from("/tmp/claw-state")));
        assert_eq!(config.resize_debounce(), Duration::from_millis(120));
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_empty_values_keep_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[(ENV_PROGRAM, "  "), (ENV_LOG, "")])).unwrap();
        assert_eq!(config.launcher.program, PathBuf::from("node"));
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_invalid_debounce_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[(ENV_RESIZE_DEBOUNCE_MS, "fast")])).unwrap_err();
        assert!(err.to_string().contains(ENV_RESIZE_DEBOUNCE_MS));
    }

    #[test]
    fn test_tab_options_use_configured_debounce() {
        let config = AppConfig {
            resize_debounce_ms: 10,
            ..AppConfig::default()
        };
        let options = config.tab_options(vec!["gateway".to_string()], Settings::default());
        assert_eq!(options.resize_debounce, Duration::from_millis(10));
        assert_eq!(options.args, vec!["gateway".to_string()]);
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: AppConfig =
            serde_json::from_str(r#"{"resizeDebounceMs": 75, "launcher": {"program": "bun"}}"#)
                .unwrap();
        assert_eq!(config.resize_debounce_ms, 75);
        assert_eq!(config.launcher.program, PathBuf::from("bun"));
        assert_eq!(config.launcher.allowed_args.len(), 4);
    }
}
