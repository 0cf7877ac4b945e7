//! 子进程命令构建
//!
//! 根据启动参数构建 PTY 子进程命令。
//!
//! ## 功能
//! - 子命令参数白名单校验
//! - 清空继承环境，只透传安全的系统变量
//! - 将设置中的 `*_API_KEY` 注入为环境变量
//! - 设置隔离变量（禁止自重启、独立状态目录）
//! - 工作目录设为用户主目录

use std::path::{Path, PathBuf};

use clawrunner_core::{sanitize_log_message, LaunchParams, Settings};
use portable_pty::CommandBuilder;
use serde::{Deserialize, Serialize};

use crate::terminal::TerminalError;

/// 默认允许的子命令参数
pub const DEFAULT_ALLOWED_ARGS: &[&str] = &["onboard", "--skip-daemon", "gateway", "tui"];

/// 允许从父进程透传的环境变量
pub const PASSTHROUGH_ENV_VARS: &[&str] = &[
    // 身份
    "HOME", "USER", "LOGNAME", "SHELL",
    // 语言区域
    "LANG", "LC_ALL", "LC_CTYPE", "LC_MESSAGES", "LC_COLLATE",
    "LC_MONETARY", "LC_NUMERIC", "LC_TIME", "LANGUAGE",
    // 临时目录
    "TMPDIR", "TMP", "TEMP",
    // 图形环境
    "DISPLAY", "WAYLAND_DISPLAY", "XDG_RUNTIME_DIR",
    "__CF_USER_TEXT_ENCODING",
    // SSH agent
    "SSH_AUTH_SOCK", "SSH_AGENT_PID",
    // 代理
    "HTTP_PROXY", "HTTPS_PROXY", "NO_PROXY",
    "http_proxy", "https_proxy", "no_proxy",
    "NODE_EXTRA_CA_CERTS",
];

const MAX_ENV_KEY_LEN: usize = 64;

/// 子进程写入状态目录的配置文件
pub const CONFIG_FILE_NAME: &str = "openclaw.json";

/// 判断设置中的键是否允许作为环境变量注入
pub fn is_allowed_env_key(key: &str) -> bool {
    key.len() <= MAX_ENV_KEY_LEN
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && key.ends_with("_API_KEY")
}

/// 启动器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LauncherConfig {
    /// 运行时可执行文件（如 node）
    pub program: PathBuf,
    /// 入口脚本，None 时直接把参数交给 program
    pub entry: Option<PathBuf>,
    /// 运行时参数，位于入口脚本之前
    pub runtime_flags: Vec<String>,
    /// 允许的子命令参数
    pub allowed_args: Vec<String>,
    /// 状态目录，None 时使用 `~/.openclaw-desktop/openclaw-state`
    pub state_dir: Option<PathBuf>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("node"),
            entry: None,
            runtime_flags: vec!["--disable-warning=ExperimentalWarning".to_string()],
            allowed_args: DEFAULT_ALLOWED_ARGS.iter().map(|s| s.to_string()).collect(),
            state_dir: None,
        }
    }
}

/// 默认状态目录
pub fn default_state_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".openclaw-desktop").join("openclaw-state"))
}

/// 命令构建器
#[derive(Debug, Clone, Default)]
pub struct CommandLauncher {
    config: LauncherConfig,
}

impl CommandLauncher {
    pub fn new(config: LauncherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// 校验子命令参数
    pub fn validate_args(&self, args: &[String]) -> Result<(), TerminalError> {
        match args
            .iter()
            .find(|arg| !self.config.allowed_args.iter().any(|allowed| allowed == *arg))
        {
            Some(arg) => Err(TerminalError::DisallowedArgument(arg.clone())),
            None => Ok(()),
        }
    }

    /// 解析并创建状态目录（unix 下权限 0700）
    pub fn ensure_state_dir(&self) -> Result<PathBuf, TerminalError> {
        let state_dir = match &self.config.state_dir {
            Some(dir) => dir.clone(),
            None => default_state_dir()
                .ok_or_else(|| TerminalError::Internal("无法确定用户主目录".to_string()))?,
        };

        std::fs::create_dir_all(&state_dir)
            .map_err(|e| TerminalError::Internal(format!("创建状态目录失败: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            if let Err(e) = std::fs::set_permissions(&state_dir, perms) {
                tracing::warn!(
                    "[CommandLauncher] 设置状态目录权限失败: dir={}, error={}",
                    state_dir.display(),
                    e
                );
            }
        }

        Ok(state_dir)
    }

    /// 状态目录中已有配置文件（完成过 onboard）
    pub fn is_configured(&self) -> bool {
        self.config
            .state_dir
            .clone()
            .or_else(default_state_dir)
            .is_some_and(|dir| dir.join(CONFIG_FILE_NAME).exists())
    }

    /// 构建子进程命令
    pub fn build_command(&self, params: &LaunchParams) -> Result<CommandBuilder, TerminalError> {
        self.validate_args(&params.args)?;
        let state_dir = self.ensure_state_dir()?;

        let mut cmd = CommandBuilder::new(&self.config.program);
        cmd.env_clear();
        let env = self.environment(&params.settings, &state_dir);
        if tracing::enabled!(tracing::Level::DEBUG) {
            let summary: Vec<String> = env.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            tracing::debug!(
                "[CommandLauncher] 子进程环境: {}",
                sanitize_log_message(&summary.join(" "))
            );
        }
        for (key, value) in env {
            cmd.env(key, value);
        }

        for flag in &self.config.runtime_flags {
            cmd.arg(flag);
        }
        if let Some(entry) = &self.config.entry {
            cmd.arg(entry);
        }
        for arg in &params.args {
            cmd.arg(arg);
        }

        if let Some(home) = dirs::home_dir() {
            cmd.cwd(home);
        }

        tracing::info!(
            "[CommandLauncher] 构建命令: program={}, args={:?}",
            self.config.program.display(),
            params.args
        );
        Ok(cmd)
    }

    /// 子进程环境变量（按设置顺序，后者覆盖前者）
    pub fn environment(&self, settings: &Settings, state_dir: &Path) -> Vec<(String, String)> {
        let mut env: Vec<(String, String)> = PASSTHROUGH_ENV_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok().map(|value| (var.to_string(), value)))
            .collect();

        env.push(("TERM".to_string(), "xterm-256color".to_string()));

        let path = prepend_path(&self.config.program, std::env::var("PATH").unwrap_or_default());
        if !path.is_empty() {
            env.push(("PATH".to_string(), path));
        }

        env.push(("OPENCLAW_NO_RESPAWN".to_string(), "1".to_string()));
        env.push((
            "OPENCLAW_STATE_DIR".to_string(),
            state_dir.to_string_lossy().into_owned(),
        ));

        for (key, value) in &settings.api_keys {
            if value.is_empty() {
                continue;
            }
            if is_allowed_env_key(key) {
                env.push((key.clone(), value.clone()));
            } else {
                tracing::warn!("[CommandLauncher] 忽略不允许的环境变量: key={}", key);
            }
        }

        env
    }
}

/// 把运行时所在目录加到 PATH 前面
fn prepend_path(program: &Path, path: String) -> String {
    let Some(dir) = program.parent().filter(|dir| !dir.as_os_str().is_empty()) else {
        return path;
    };
    let sep = if cfg!(target_os = "windows") { ";" } else { ":" };
    if path.is_empty() {
        dir.to_string_lossy().into_owned()
    } else {
        format!("{}{}{}", dir.to_string_lossy(), sep, path)
    }
}
