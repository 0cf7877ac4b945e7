//! 标签页注册表
//!
//! 管理所有终端标签页的注册和查找。
//!
//! ## 功能
//! - 打开标签页（分配 UUID）
//! - 按 tab_id 查找标签页
//! - 关闭单个标签页或全部标签页（窗口关闭）
//! - 列出所有标签页

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::tab::{TabOptions, TerminalTab};
use super::traits::{ProcessHost, TerminalSurface};

/// 共享的标签页句柄
pub type SharedTab = Arc<Mutex<TerminalTab>>;

/// 标签页注册表
///
/// 所有标签页共享同一个进程宿主。
pub struct TabRegistry {
    host: Arc<dyn ProcessHost>,
    options: TabOptions,
    /// 标签页映射表: tab_id -> TerminalTab
    tabs: RwLock<HashMap<String, SharedTab>>,
}

impl TabRegistry {
    pub fn new(host: Arc<dyn ProcessHost>, options: TabOptions) -> Self {
        Self {
            host,
            options,
            tabs: RwLock::new(HashMap::new()),
        }
    }

    /// 新标签页使用的默认选项
    pub fn options(&self) -> &TabOptions {
        &self.options
    }

    /// 打开新标签页
    ///
    /// 会话在渲染面上报第一次尺寸后才启动。
    pub async fn open_tab(&self, surface: Arc<dyn TerminalSurface>) -> (String, SharedTab) {
        let tab_id = uuid::Uuid::new_v4().to_string();
        let tab = TerminalTab::new(
            tab_id.clone(),
            Arc::clone(&self.host),
            surface,
            self.options.clone(),
        );
        let tab = Arc::new(Mutex::new(tab));
        self.tabs.write().await.insert(tab_id.clone(), Arc::clone(&tab));
        tracing::info!("[TabRegistry] 打开标签页: tab_id={}", tab_id);
        (tab_id, tab)
    }

    /// 注册已有标签页
    ///
    /// 如果已存在同 tab_id 的标签页，返回旧标签页（由调用方负责关闭）。
    pub async fn register(&self, tab: TerminalTab) -> Option<SharedTab> {
        let tab_id = tab.tab_id().to_string();
        self.tabs
            .write()
            .await
            .insert(tab_id, Arc::new(Mutex::new(tab)))
    }

    /// 获取标签页
    pub async fn get(&self, tab_id: &str) -> Option<SharedTab> {
        self.tabs.read().await.get(tab_id).cloned()
    }

    pub async fn contains(&self, tab_id: &str) -> bool {
        self.tabs.read().await.contains_key(tab_id)
    }

    /// 关闭标签页
    ///
    /// 返回标签页是否存在。会话清理完成后才返回。
    pub async fn close_tab(&self, tab_id: &str) -> bool {
        let removed = self.tabs.write().await.remove(tab_id);
        match removed {
            Some(tab) => {
                tab.lock().await.close().await;
                true
            }
            None => {
                tracing::debug!("[TabRegistry] 标签页不存在: tab_id={}", tab_id);
                false
            }
        }
    }

    /// 关闭全部标签页（窗口关闭）
    pub async fn close_all(&self) {
        let tabs: Vec<SharedTab> = self.tabs.write().await.drain().map(|(_, tab)| tab).collect();
        tracing::info!("[TabRegistry] 关闭全部标签页: count={}", tabs.len());
        for tab in tabs {
            tab.lock().await.close().await;
        }
    }

    /// 获取所有 tab_id
    pub async fn list_tab_ids(&self) -> Vec<String> {
        self.tabs.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.tabs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tabs.read().await.is_empty()
    }
}
