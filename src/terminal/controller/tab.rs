//! 终端标签页
//!
//! 把渲染面的尺寸/焦点/输入通知转换为会话控制器的操作。
//!
//! ## 功能
//! - 第一次有效尺寸决定启动参数并触发 spawn（不再作为 resize 重发）
//! - 之后的尺寸变更做防抖，只发送窗口结束时的最后一个尺寸；spawn 未返回时等会话 running 后再发
//! - 标签页不可见时暂停尺寸上报；重新激活时发送一次当前尺寸并恢复焦点
//! - 重启：丢弃当前控制器，用最新尺寸和设置创建新实例

use std::sync::Arc;
use std::time::Duration;

use clawrunner_core::{ControllerStatus, LaunchParams, SessionId, SessionStatus, Settings, TermSize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::session_controller::{SessionController, SessionInput};
use super::traits::{OutputSlot, ProcessHost, TerminalSurface};
use crate::terminal::TerminalError;

/// 默认尺寸防抖窗口
pub const DEFAULT_RESIZE_DEBOUNCE: Duration = Duration::from_millis(50);

/// 标签页启动选项
#[derive(Debug, Clone)]
pub struct TabOptions {
    /// 子命令参数
    pub args: Vec<String>,
    /// 下一次 spawn 使用的设置
    pub settings: Settings,
    /// 尺寸防抖窗口
    pub resize_debounce: Duration,
}

impl Default for TabOptions {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            settings: Settings::default(),
            resize_debounce: DEFAULT_RESIZE_DEBOUNCE,
        }
    }
}

/// 终端标签页
pub struct TerminalTab {
    tab_id: String,
    host: Arc<dyn ProcessHost>,
    output: OutputSlot,
    options: TabOptions,
    controller: Option<SessionController>,
    latest_size: Option<TermSize>,
    active: bool,
    pending_resize: Option<JoinHandle<()>>,
}

impl TerminalTab {
    /// 创建标签页（初始为激活状态，尚未启动会话）
    pub fn new(
        tab_id: impl Into<String>,
        host: Arc<dyn ProcessHost>,
        surface: Arc<dyn TerminalSurface>,
        options: TabOptions,
    ) -> Self {
        Self {
            tab_id: tab_id.into(),
            host,
            output: OutputSlot::new(surface),
            options,
            controller: None,
            latest_size: None,
            active: true,
            pending_resize: None,
        }
    }

    pub fn tab_id(&self) -> &str {
        &self.tab_id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// 最近一次上报的有效尺寸
    pub fn latest_size(&self) -> Option<TermSize> {
        self.latest_size
    }

    /// 当前会话 ID
    pub fn session_id(&self) -> Option<SessionId> {
        self.controller.as_ref().and_then(SessionController::session_id)
    }

    /// 订阅当前控制器的状态，尚未启动时返回 None
    pub fn status(&self) -> Option<watch::Receiver<ControllerStatus>> {
        self.controller.as_ref().map(SessionController::status)
    }

    /// 替换渲染面，下一块输出即写入新渲染面
    pub fn set_surface(&self, surface: Arc<dyn TerminalSurface>) {
        self.output.replace(surface);
    }

    /// 更新设置，只影响下一次 spawn
    pub fn set_settings(&mut self, settings: Settings) {
        self.options.settings = settings;
    }

    /// 更新子命令参数，只影响下一次 spawn
    pub fn set_args(&mut self, args: Vec<String>) {
        self.options.args = args;
    }

    /// 渲染面上报尺寸变更
    pub fn on_size_changed(&mut self, cols: u16, rows: u16) -> Result<(), TerminalError> {
        let size = TermSize::new(cols, rows);
        if size.is_empty() {
            tracing::debug!(
                "[TerminalTab] 忽略空尺寸: tab_id={}, size={}",
                self.tab_id,
                size
            );
            return Ok(());
        }
        self.latest_size = Some(size);

        if !self.active {
            self.cancel_pending_resize();
            return Ok(());
        }

        if self.controller.is_none() {
            return self.launch(size);
        }
        self.schedule_resize(size);
        Ok(())
    }

    /// 渲染面捕获到的用户输入
    pub fn on_user_input(&self, data: impl Into<Vec<u8>>) {
        if let Some(controller) = &self.controller {
            controller.write(data);
        }
    }

    /// 切换激活状态
    pub fn set_active(&mut self, active: bool) -> Result<(), TerminalError> {
        if self.active == active {
            return Ok(());
        }
        self.active = active;

        if !active {
            self.cancel_pending_resize();
            self.output.current().blur();
            return Ok(());
        }

        if let Some(size) = self.latest_size {
            if self.controller.is_none() {
                self.launch(size)?;
            } else {
                tracing::debug!(
                    "[TerminalTab] 重新激活，同步尺寸: tab_id={}, size={}",
                    self.tab_id,
                    size
                );
                self.spawn_resize(size, Duration::ZERO);
            }
        }
        self.output.current().focus();
        Ok(())
    }

    /// 重启：销毁当前控制器，用最新尺寸和设置创建新实例
    pub fn restart(&mut self) -> Result<(), TerminalError> {
        self.cancel_pending_resize();
        if let Some(old) = self.controller.take() {
            tracing::info!(
                "[TerminalTab] 重启会话: tab_id={}, old_session={:?}",
                self.tab_id,
                old.session_id()
            );
            old.teardown();
        }

        match self.latest_size {
            Some(size) if self.active => self.launch(size),
            _ => Ok(()),
        }
    }

    /// 关闭标签页并等待会话清理完成
    pub async fn close(&mut self) {
        self.cancel_pending_resize();
        if let Some(mut controller) = self.controller.take() {
            controller.shutdown().await;
        }
        tracing::info!("[TerminalTab] 标签页已关闭: tab_id={}", self.tab_id);
    }

    fn launch(&mut self, size: TermSize) -> Result<(), TerminalError> {
        let params = LaunchParams::new(self.options.args.clone(), self.options.settings.clone(), size);
        let controller = SessionController::spawn(
            self.tab_id.clone(),
            Arc::clone(&self.host),
            params,
            self.output.clone(),
        )?;
        self.controller = Some(controller);
        Ok(())
    }

    /// 重启防抖计时器，窗口结束时发送最后一个尺寸
    fn schedule_resize(&mut self, size: TermSize) {
        let window = self.options.resize_debounce;
        self.spawn_resize(size, window);
    }

    /// 取代待发送的尺寸：等待 `window` 后发送，spawn 未返回时等到会话 running 再发
    fn spawn_resize(&mut self, size: TermSize, window: Duration) {
        let Some((input, status)) = self
            .controller
            .as_ref()
            .map(|controller| (controller.input(), controller.status()))
        else {
            return;
        };
        self.cancel_pending_resize();

        self.pending_resize = Some(tokio::spawn(async move {
            if !window.is_zero() {
                tokio::time::sleep(window).await;
            }
            resize_when_running(input, status, size).await;
        }));
    }

    fn cancel_pending_resize(&mut self) {
        if let Some(handle) = self.pending_resize.take() {
            handle.abort();
        }
    }
}

/// 会话进入 running 后发送尺寸；spawn 失败或会话已结束时放弃
async fn resize_when_running(
    input: SessionInput,
    mut status: watch::Receiver<ControllerStatus>,
    size: TermSize,
) {
    let running = match status.wait_for(|s| s.status != SessionStatus::Starting).await {
        Ok(snapshot) => snapshot.status == SessionStatus::Running,
        Err(_) => false,
    };
    if running {
        input.resize(size);
    }
}

impl Drop for TerminalTab {
    fn drop(&mut self) {
        self.cancel_pending_resize();
    }
}
