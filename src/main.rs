//! clawrunner 命令行入口
//!
//! 在当前终端里运行一个标签页：PTY 输出写到 stdout，stdin 按行转发给子进程。
//! 参数为子命令（如 `gateway`、`onboard --skip-daemon`）；省略时按状态目录是否
//! 已完成配置选择 `tui` 或 `onboard --skip-daemon`。

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clawrunner_core::{init_tracing, ControllerStatus, SessionStatus, Settings, TermSize};
use clawrunner_lib::config::AppConfig;
use clawrunner_lib::terminal::{
    CommandLauncher, PtyProcessHost, TabRegistry, TerminalSurface,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

/// 把会话输出写到 stdout 的渲染面
struct StdoutSurface;

impl TerminalSurface for StdoutSurface {
    fn write_output(&self, data: &[u8]) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(data).and_then(|_| stdout.flush()) {
            tracing::debug!("[main] 写入 stdout 失败: error={}", e);
        }
    }
}

/// 从 COLUMNS / LINES 读取终端尺寸，缺省 80x24
fn terminal_size() -> TermSize {
    let read = |key: &str| {
        std::env::var(key)
            .ok()
            .and_then(|value| value.trim().parse::<u16>().ok())
            .filter(|value| *value > 0)
    };
    let fallback = TermSize::default();
    TermSize::new(
        read("COLUMNS").unwrap_or(fallback.cols),
        read("LINES").unwrap_or(fallback.rows),
    )
}

/// 从环境变量收集 API Key 设置
fn settings_from_env() -> Settings {
    std::env::vars()
        .filter(|(key, value)| key.ends_with("_API_KEY") && !value.is_empty())
        .fold(Settings::default(), |settings, (key, value)| {
            settings.with_api_key(key, value)
        })
}

/// 等待会话进入终态
async fn wait_for_exit(mut status: watch::Receiver<ControllerStatus>) -> ControllerStatus {
    let snapshot = match status.wait_for(|s| s.status.is_terminal()).await {
        Ok(snapshot) => snapshot.clone(),
        Err(_) => ControllerStatus::new(SessionStatus::Stopped),
    };
    snapshot
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("加载配置失败")?;
    init_tracing(&config.log);
    tracing::info!("[main] clawrunner v{}", clawrunner_core::version());

    let launcher = CommandLauncher::new(config.launcher.clone());
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        args = if launcher.is_configured() {
            vec!["tui".to_string()]
        } else {
            vec!["onboard".to_string(), "--skip-daemon".to_string()]
        };
    }
    launcher
        .validate_args(&args)
        .context("子命令参数校验失败")?;

    let host = Arc::new(PtyProcessHost::new(launcher));
    let registry = TabRegistry::new(host.clone(), config.tab_options(args, settings_from_env()));

    let (tab_id, tab) = registry.open_tab(Arc::new(StdoutSurface)).await;
    let status = {
        let mut tab = tab.lock().await;
        let size = terminal_size();
        tab.on_size_changed(size.cols, size.rows)
            .context("启动会话失败")?;
        tab.status().context("会话未启动")?
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let exit = wait_for_exit(status);
    tokio::pin!(exit);

    let final_status = loop {
        tokio::select! {
            status = &mut exit => break status,
            line = lines.next_line() => match line.context("读取 stdin 失败")? {
                Some(line) => tab.lock().await.on_user_input(format!("{line}\r")),
                // stdin 关闭后只等待会话结束
                None => break (&mut exit).await,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("[main] 收到中断信号，关闭会话");
                break ControllerStatus::new(SessionStatus::Stopped);
            }
        }
    };

    registry.close_tab(&tab_id).await;
    host.kill_all().await;

    match final_status.status {
        SessionStatus::Error => {
            anyhow::bail!(
                "会话异常结束: {}",
                final_status.error_message.unwrap_or_default()
            )
        }
        _ => Ok(()),
    }
}
