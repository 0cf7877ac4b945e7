//! 本地 PTY 进程宿主
//!
//! 基于 portable-pty 的 `ProcessHost` 实现，管理全部 PTY 子进程。
//!
//! ## 功能
//! - 分配非零会话 ID 并创建 PTY 子进程
//! - 独立线程读取 PTY 输出，通过事件总线推送 data / status 事件
//! - 处理输入写入与终端大小调整
//! - 终止单个会话或全部会话（窗口关闭）

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use async_trait::async_trait;
use clawrunner_core::{EventKind, LaunchParams, SessionId, SessionStatus, TermSize};
use parking_lot::Mutex;
use portable_pty::{native_pty_system, Child, MasterPty, PtySize};

use super::event_bus::HostEventBus;
use super::launcher::CommandLauncher;
use crate::terminal::controller::{EventSubscription, ProcessHost};
use crate::terminal::TerminalError;

/// 单次写入的最大字节数
pub const MAX_WRITE_SIZE: usize = 1024 * 1024;

/// 读取缓冲区大小
const READ_CHUNK_SIZE: usize = 8192;

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;
type SharedMaster = Arc<Mutex<Box<dyn MasterPty + Send>>>;

/// 单个 PTY 会话
struct PtyInstance {
    writer: Option<SharedWriter>,
    master: Option<SharedMaster>,
    child: Box<dyn Child + Send + Sync>,
    reader_thread: Option<thread::JoinHandle<()>>,
}

impl PtyInstance {
    /// 终止子进程并回收读取线程
    ///
    /// 先关闭 writer 与 master，读取线程才能从阻塞的 read 中返回。
    fn shutdown(mut self) {
        cleanup_child(&mut self.child);
        drop(self.writer.take());
        drop(self.master.take());
        if let Some(handle) = self.reader_thread.take() {
            if handle.join().is_err() {
                tracing::warn!("[PtyHost] 读取线程异常退出");
            }
        }
    }
}

impl Drop for PtyInstance {
    fn drop(&mut self) {
        cleanup_child(&mut self.child);
    }
}

fn cleanup_child(child: &mut Box<dyn Child + Send + Sync>) {
    let _ = child.kill();
    let _ = child.wait();
}

fn pty_size(size: TermSize) -> PtySize {
    PtySize {
        rows: size.rows,
        cols: size.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// 本地 PTY 进程宿主
pub struct PtyProcessHost {
    launcher: CommandLauncher,
    bus: Arc<HostEventBus>,
    sessions: Mutex<HashMap<SessionId, PtyInstance>>,
    next_id: AtomicU64,
}

impl PtyProcessHost {
    pub fn new(launcher: CommandLauncher) -> Self {
        Self {
            launcher,
            bus: Arc::new(HostEventBus::new()),
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// 事件总线
    pub fn bus(&self) -> &Arc<HostEventBus> {
        &self.bus
    }

    /// 存活会话数
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// 分配会话 ID，跳过 0
    fn allocate_id(&self) -> SessionId {
        loop {
            let raw = self.next_id.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            if let Some(id) = SessionId::new(raw) {
                return id;
            }
        }
    }

    /// 终止全部会话（窗口关闭时调用）
    pub async fn kill_all(&self) {
        let removed: Vec<PtyInstance> = self.sessions.lock().drain().map(|(_, v)| v).collect();
        if removed.is_empty() {
            return;
        }
        tracing::info!("[PtyHost] 终止全部会话: count={}", removed.len());
        let result = tokio::task::spawn_blocking(move || {
            for instance in removed {
                instance.shutdown();
            }
        })
        .await;
        if let Err(e) = result {
            tracing::warn!("[PtyHost] 终止全部会话异常: error={}", e);
        }
    }

    fn writer(&self, session_id: SessionId) -> Result<SharedWriter, TerminalError> {
        self.sessions
            .lock()
            .get(&session_id)
            .and_then(|instance| instance.writer.clone())
            .ok_or_else(|| TerminalError::SessionNotFound(session_id.to_string()))
    }

    fn master(&self, session_id: SessionId) -> Result<SharedMaster, TerminalError> {
        self.sessions
            .lock()
            .get(&session_id)
            .and_then(|instance| instance.master.clone())
            .ok_or_else(|| TerminalError::SessionNotFound(session_id.to_string()))
    }
}

#[async_trait]
impl ProcessHost for PtyProcessHost {
    async fn spawn(&self, params: LaunchParams) -> Result<SessionId, TerminalError> {
        if params.size.is_empty() {
            return Err(TerminalError::InvalidSize {
                cols: params.size.cols,
                rows: params.size.rows,
            });
        }

        let session_id = self.allocate_id();
        let launcher = self.launcher.clone();
        let bus = Arc::clone(&self.bus);
        // openpty 与 spawn_command 都是阻塞调用
        let instance = tokio::task::spawn_blocking(move || {
            open_session(&launcher, bus, session_id, &params)
        })
        .await
        .map_err(|e| TerminalError::Internal(e.to_string()))?
        .inspect_err(|e| {
            tracing::error!("[PtyHost] 创建会话失败: session_id={}, error={}", session_id, e);
        })?;

        self.sessions.lock().insert(session_id, instance);
        Ok(session_id)
    }

    async fn write(&self, session_id: SessionId, data: &[u8]) -> Result<(), TerminalError> {
        if data.len() > MAX_WRITE_SIZE {
            return Err(TerminalError::WriteTooLarge(data.len()));
        }
        // 先取出 writer 再做 I/O，避免一个会话阻塞其他会话
        let writer = self.writer(session_id)?;
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut w = writer.lock();
            w.write_all(&data)
                .map_err(|e| TerminalError::WriteFailed(e.to_string()))?;
            w.flush().map_err(|e| TerminalError::WriteFailed(e.to_string()))
        })
        .await
        .map_err(|e| TerminalError::Internal(e.to_string()))?
    }

    async fn resize(&self, session_id: SessionId, size: TermSize) -> Result<(), TerminalError> {
        if size.is_empty() {
            return Err(TerminalError::InvalidSize {
                cols: size.cols,
                rows: size.rows,
            });
        }
        let master = self.master(session_id)?;
        master
            .lock()
            .resize(pty_size(size))
            .map_err(|e| TerminalError::ResizeFailed(e.to_string()))?;
        tracing::debug!("[PtyHost] 调整大小: session_id={}, size={}", session_id, size);
        Ok(())
    }

    async fn kill(&self, session_id: SessionId) -> Result<(), TerminalError> {
        let Some(instance) = self.sessions.lock().remove(&session_id) else {
            tracing::debug!("[PtyHost] 会话不存在，忽略 kill: session_id={}", session_id);
            return Ok(());
        };
        tracing::info!("[PtyHost] 终止会话: session_id={}", session_id);
        tokio::task::spawn_blocking(move || instance.shutdown())
            .await
            .map_err(|e| TerminalError::KillFailed(e.to_string()))
    }

    async fn subscribe(&self, kind: EventKind) -> Result<EventSubscription, TerminalError> {
        Ok(self.bus.subscribe(kind))
    }
}

impl Drop for PtyProcessHost {
    fn drop(&mut self) {
        let remaining = self.sessions.lock().len();
        if remaining > 0 {
            tracing::debug!("[PtyHost] 宿主销毁，清理残留会话: count={}", remaining);
        }
        self.sessions.lock().clear();
    }
}

/// 创建 PTY 并启动子进程（阻塞）
fn open_session(
    launcher: &CommandLauncher,
    bus: Arc<HostEventBus>,
    session_id: SessionId,
    params: &LaunchParams,
) -> Result<PtyInstance, TerminalError> {
    let cmd = launcher.build_command(params)?;

    let pair = native_pty_system()
        .openpty(pty_size(params.size))
        .map_err(|e| TerminalError::PtyCreationFailed(e.to_string()))?;

    let child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| TerminalError::PtyCreationFailed(e.to_string()))?;
    // 释放 slave 端，子进程退出后 master 才能读到 EOF
    drop(pair.slave);

    // 拿不到读写端时回收子进程
    let child = scopeguard::guard(child, |mut child| cleanup_child(&mut child));

    let writer = pair
        .master
        .take_writer()
        .map_err(|e| TerminalError::PtyCreationFailed(format!("获取写入端失败: {}", e)))?;
    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| TerminalError::PtyCreationFailed(format!("获取读取端失败: {}", e)))?;

    tracing::info!(
        "[PtyHost] 进程已创建: session_id={}, pid={:?}, size={}",
        session_id,
        child.process_id(),
        params.size
    );

    let reader_thread = spawn_reader_thread(session_id, reader, bus)?;

    Ok(PtyInstance {
        writer: Some(Arc::new(Mutex::new(writer))),
        master: Some(Arc::new(Mutex::new(pair.master))),
        child: scopeguard::ScopeGuard::into_inner(child),
        reader_thread: Some(reader_thread),
    })
}

/// 启动输出读取线程
///
/// EOF 时推送 `stopped`，读取出错时推送 `error`。
fn spawn_reader_thread(
    session_id: SessionId,
    mut reader: Box<dyn Read + Send>,
    bus: Arc<HostEventBus>,
) -> Result<thread::JoinHandle<()>, TerminalError> {
    thread::Builder::new()
        .name(format!("pty-reader-{}", session_id))
        .spawn(move || {
            let mut buffer = [0u8; READ_CHUNK_SIZE];
            let error = loop {
                match reader.read(&mut buffer) {
                    Ok(0) => break None,
                    Ok(n) => {
                        bus.publish_data(session_id, buffer[..n].to_vec());
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => break Some(e.to_string()),
                }
            };

            match error {
                None => {
                    tracing::info!("[PtyHost] 进程已退出: session_id={}", session_id);
                    bus.publish_status(session_id, SessionStatus::Stopped, None);
                }
                Some(message) => {
                    tracing::warn!(
                        "[PtyHost] 读取错误: session_id={}, error={}",
                        session_id,
                        message
                    );
                    bus.publish_status(session_id, SessionStatus::Error, Some(message));
                }
            }
        })
        .map_err(|e| TerminalError::PtyCreationFailed(format!("启动读取线程失败: {}", e)))
}
