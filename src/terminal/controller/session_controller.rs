//! 会话控制器
//!
//! 每个终端标签页一个实例，负责一个会话从"尺寸已知"到终止的完整生命周期。
//!
//! ## 启动协议
//! 1. 先建立 data / status 两类事件订阅，再发起 spawn
//! 2. spawn 返回之前收到的事件全部缓冲（按类型保持到达顺序）
//! 3. spawn 成功：记录会话 ID，状态置为 running，补发 ID 匹配的缓冲事件，其余丢弃
//! 4. spawn 失败：状态置为 error，丢弃全部缓冲
//! 5. spawn 未返回时被销毁：等结果返回后若拿到会话 ID，立即 kill
//!
//! ## 并发模型
//! 控制器状态只由一个 tokio 任务持有，spawn 结果、入站事件、命令、销毁信号
//! 在该任务内顺序处理，不需要锁。写入与调整大小交给独立的输入任务串行发送，
//! 慢速写入不会阻塞事件路由。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clawrunner_core::{
    ControllerStatus, EventKind, HostEvent, LaunchParams, SessionId, SessionStatus,
    TerminalDataEvent, TerminalStatusEvent, TermSize,
};
use futures::future;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::router::EventRouter;
use super::status::StatusTracker;
use super::traits::{EventSubscription, OutputSlot, ProcessHost};
use crate::terminal::TerminalError;

/// 发往宿主的命令
#[derive(Debug, Clone, PartialEq, Eq)]
enum HostCommand {
    Write(Vec<u8>),
    Resize(TermSize),
}

/// 会话输入端
///
/// 可克隆，供防抖任务等在控制器之外提交写入与调整大小。
/// 会话尚未分配或控制器已销毁时提交的命令不会到达宿主。
#[derive(Clone)]
pub struct SessionInput {
    command_tx: mpsc::UnboundedSender<HostCommand>,
    /// 当前会话 ID，0 表示尚未分配
    session_slot: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl SessionInput {
    /// 当前会话 ID
    pub fn session_id(&self) -> Option<SessionId> {
        SessionId::new(self.session_slot.load(Ordering::SeqCst))
    }

    pub fn is_ready(&self) -> bool {
        self.session_id().is_some() && !self.cancel.is_cancelled()
    }

    /// 写入用户输入
    ///
    /// 会话尚未分配时为空操作，返回 false。
    pub fn write(&self, data: impl Into<Vec<u8>>) -> bool {
        if !self.is_ready() {
            return false;
        }
        self.command_tx.send(HostCommand::Write(data.into())).is_ok()
    }

    /// 调整终端大小，空尺寸被忽略
    pub fn resize(&self, size: TermSize) -> bool {
        if size.is_empty() || !self.is_ready() {
            return false;
        }
        self.command_tx.send(HostCommand::Resize(size)).is_ok()
    }
}

/// 会话控制器句柄
///
/// 丢弃句柄等同于销毁：会话会被 kill，订阅会被释放。
pub struct SessionController {
    tab_id: String,
    input: SessionInput,
    status_rx: watch::Receiver<ControllerStatus>,
    output: OutputSlot,
    task: Option<JoinHandle<()>>,
}

impl SessionController {
    /// 启动控制器
    ///
    /// 必须在 tokio 运行时内调用。初始尺寸为空时拒绝启动。
    pub fn spawn(
        tab_id: impl Into<String>,
        host: Arc<dyn ProcessHost>,
        params: LaunchParams,
        output: OutputSlot,
    ) -> Result<Self, TerminalError> {
        if params.size.is_empty() {
            return Err(TerminalError::InvalidSize {
                cols: params.size.cols,
                rows: params.size.rows,
            });
        }

        let tab_id = tab_id.into();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let status = StatusTracker::new();
        let status_rx = status.subscribe();
        let session_slot = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();

        tracing::info!(
            "[SessionController] 创建控制器: tab_id={}, size={}, args={:?}",
            tab_id,
            params.size,
            params.args
        );

        let actor = ControllerTask {
            tab_id: tab_id.clone(),
            host,
            router: EventRouter::new(),
            status,
            output: output.clone(),
            session_slot: session_slot.clone(),
            cancel: cancel.clone(),
            commands: command_rx,
        };
        let task = tokio::spawn(actor.run(params));

        Ok(Self {
            tab_id,
            input: SessionInput {
                command_tx,
                session_slot,
                cancel,
            },
            status_rx,
            output,
            task: Some(task),
        })
    }

    pub fn tab_id(&self) -> &str {
        &self.tab_id
    }

    /// 当前会话 ID
    pub fn session_id(&self) -> Option<SessionId> {
        self.input.session_id()
    }

    /// 输入端句柄
    pub fn input(&self) -> SessionInput {
        self.input.clone()
    }

    /// 订阅状态变更
    pub fn status(&self) -> watch::Receiver<ControllerStatus> {
        self.status_rx.clone()
    }

    /// 当前状态快照
    pub fn current_status(&self) -> ControllerStatus {
        self.status_rx.borrow().clone()
    }

    /// 输出槽，可替换渲染面
    pub fn output(&self) -> &OutputSlot {
        &self.output
    }

    /// 写入用户输入
    ///
    /// 会话尚未分配时为空操作；写入失败只记录日志，会话是否退出以状态事件为准。
    pub fn write(&self, data: impl Into<Vec<u8>>) {
        if !self.input.write(data) {
            tracing::debug!(
                "[SessionController] 会话未就绪，忽略写入: tab_id={}",
                self.tab_id
            );
        }
    }

    /// 调整终端大小（尽力而为）
    pub fn resize(&self, size: TermSize) {
        self.input.resize(size);
    }

    /// 销毁控制器（幂等）
    ///
    /// kill 当前会话并释放订阅。spawn 尚未返回时，结果返回后立即 kill。
    pub fn teardown(&self) {
        if !self.input.cancel.is_cancelled() {
            tracing::info!("[SessionController] 销毁控制器: tab_id={}", self.tab_id);
            self.input.cancel.cancel();
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.input.cancel.is_cancelled()
    }

    /// 销毁并等待后台任务结束（包括等待未返回的 spawn 与随后的 kill）
    pub async fn shutdown(&mut self) {
        self.teardown();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(
                    "[SessionController] 后台任务异常结束: tab_id={}, error={}",
                    self.tab_id,
                    e
                );
            }
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.input.cancel.cancel();
    }
}

/// 控制器后台任务，独占全部可变状态
struct ControllerTask {
    tab_id: String,
    host: Arc<dyn ProcessHost>,
    router: EventRouter,
    status: StatusTracker,
    output: OutputSlot,
    session_slot: Arc<AtomicU64>,
    cancel: CancellationToken,
    commands: mpsc::UnboundedReceiver<HostCommand>,
}

impl ControllerTask {
    async fn run(mut self, params: LaunchParams) {
        // 1. 先订阅，保证 spawn 之后宿主立刻发出的事件也能收到
        let Some((mut data_sub, mut status_sub)) = self.subscribe().await else {
            return;
        };

        // 2. 发起 spawn，等待期间缓冲事件
        let host = Arc::clone(&self.host);
        let mut spawn = Box::pin(async move { host.spawn(params).await });

        let spawn_result = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    drop(data_sub);
                    drop(status_sub);
                    let discarded = self.router.close();
                    tracing::info!(
                        "[SessionController] spawn 未返回时被销毁，等待结果后清理: tab_id={}, discarded={}",
                        self.tab_id,
                        discarded
                    );
                    if let Ok(session_id) = spawn.await {
                        self.kill(session_id).await;
                    }
                    return;
                }
                result = &mut spawn => break result,
                Some(event) = data_sub.recv() => self.handle_event(event),
                Some(event) = status_sub.recv() => self.handle_event(event),
                Some(command) = self.commands.recv() => {
                    tracing::debug!(
                        "[SessionController] 会话未就绪，丢弃命令: tab_id={}, command={:?}",
                        self.tab_id,
                        command
                    );
                }
            }
        };

        // 3. 处理 spawn 结果
        let session_id = match spawn_result {
            Ok(session_id) => session_id,
            Err(e) => {
                let discarded = self.router.close();
                tracing::error!(
                    "[SessionController] spawn 失败: tab_id={}, error={}, discarded={}",
                    self.tab_id,
                    e,
                    discarded
                );
                self.status.transition(SessionStatus::Error, Some(e.to_string()));
                return;
            }
        };

        // spawn 返回的同一轮里可能已被销毁
        if self.cancel.is_cancelled() {
            drop(data_sub);
            drop(status_sub);
            let discarded = self.router.close();
            tracing::info!(
                "[SessionController] spawn 返回时已销毁，直接清理: tab_id={}, session_id={}, discarded={}",
                self.tab_id,
                session_id,
                discarded
            );
            self.kill(session_id).await;
            return;
        }

        self.session_slot.store(session_id.get(), Ordering::SeqCst);
        self.status.transition(SessionStatus::Running, None);
        let drained = self.router.assign(session_id);
        tracing::info!(
            "[SessionController] 会话已启动: tab_id={}, session_id={}, replay_data={}, replay_status={}, discarded={}",
            self.tab_id,
            session_id,
            drained.data.len(),
            drained.status.len(),
            drained.discarded
        );
        for event in drained.data {
            self.deliver_data(event);
        }
        for event in drained.status {
            self.apply_status(event);
        }

        // 4. 稳态：过滤转发事件，命令交给输入任务
        let (input_tx, input_task) = self.start_input_pump(session_id);
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(event) = data_sub.recv() => self.handle_event(event),
                Some(event) = status_sub.recv() => self.handle_event(event),
                Some(command) = self.commands.recv() => {
                    let _ = input_tx.send(command);
                }
            }
        }

        // 5. 销毁：停止输入、释放订阅、kill 会话
        input_task.abort();
        drop(data_sub);
        drop(status_sub);
        self.router.close();
        self.kill(session_id).await;
        tracing::info!(
            "[SessionController] 控制器已销毁: tab_id={}, session_id={}",
            self.tab_id,
            session_id
        );
    }

    /// 建立两类事件订阅，被销毁或订阅失败时返回 None
    async fn subscribe(&mut self) -> Option<(EventSubscription, EventSubscription)> {
        let subscribe = future::try_join(
            self.host.subscribe(EventKind::Data),
            self.host.subscribe(EventKind::Status),
        );

        // 销毁时直接丢弃订阅 future，进行中的订阅随之释放
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::debug!(
                    "[SessionController] 订阅完成前被销毁: tab_id={}",
                    self.tab_id
                );
                return None;
            }
            result = subscribe => result,
        };

        match result {
            Ok(subs) => Some(subs),
            Err(e) => {
                tracing::error!(
                    "[SessionController] 事件订阅失败: tab_id={}, error={}",
                    self.tab_id,
                    e
                );
                self.router.close();
                self.status.transition(SessionStatus::Error, Some(e.to_string()));
                None
            }
        }
    }

    fn handle_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::Data(event) => {
                if let Some(event) = self.router.offer_data(event) {
                    self.deliver_data(event);
                }
            }
            HostEvent::Status(event) => {
                if let Some(event) = self.router.offer_status(event) {
                    self.apply_status(event);
                }
            }
        }
    }

    fn deliver_data(&self, event: TerminalDataEvent) {
        self.output.write_output(&event.data);
    }

    fn apply_status(&self, event: TerminalStatusEvent) {
        let status = event.parsed_status();
        let message = if event.is_recognized() {
            event.error_message
        } else {
            tracing::warn!(
                "[SessionController] 未知会话状态，按 error 处理: tab_id={}, session_id={}, status={}",
                self.tab_id,
                event.session_id,
                event.status
            );
            event
                .error_message
                .or_else(|| Some(format!("未知会话状态: {}", event.status)))
        };

        if self.status.transition(status, message) {
            tracing::info!(
                "[SessionController] 状态更新: tab_id={}, session_id={}, status={}",
                self.tab_id,
                event.session_id,
                status
            );
        }
    }

    /// 启动输入任务，按提交顺序串行发送写入与调整大小命令
    fn start_input_pump(
        &self,
        session_id: SessionId,
    ) -> (mpsc::UnboundedSender<HostCommand>, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<HostCommand>();
        let host = Arc::clone(&self.host);
        let tab_id = self.tab_id.clone();

        let task = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    HostCommand::Write(data) => {
                        if let Err(e) = host.write(session_id, &data).await {
                            tracing::debug!(
                                "[SessionController] 写入失败（忽略）: tab_id={}, session_id={}, error={}",
                                tab_id,
                                session_id,
                                e
                            );
                        }
                    }
                    HostCommand::Resize(size) => {
                        if let Err(e) = host.resize(session_id, size).await {
                            tracing::debug!(
                                "[SessionController] 调整大小失败（忽略）: tab_id={}, session_id={}, error={}",
                                tab_id,
                                session_id,
                                e
                            );
                        }
                    }
                }
            }
        });

        (tx, task)
    }

    async fn kill(&self, session_id: SessionId) {
        if let Err(e) = self.host.kill(session_id).await {
            tracing::debug!(
                "[SessionController] kill 失败（忽略）: tab_id={}, session_id={}, error={}",
                self.tab_id,
                session_id,
                e
            );
        }
    }
}
