//! 终端模块错误类型
//!
//! 定义会话控制器与进程宿主相关的错误类型。

use thiserror::Error;

/// 终端错误类型
#[derive(Debug, Error)]
pub enum TerminalError {
    /// 会话不存在
    #[error("会话不存在: {0}")]
    SessionNotFound(String),

    /// PTY 创建失败
    #[error("PTY 创建失败: {0}")]
    PtyCreationFailed(String),

    /// 写入失败
    #[error("写入失败: {0}")]
    WriteFailed(String),

    /// 调整大小失败
    #[error("调整大小失败: {0}")]
    ResizeFailed(String),

    /// 终止失败
    #[error("终止失败: {0}")]
    KillFailed(String),

    /// 终端大小无效
    #[error("终端大小无效: {cols}x{rows}")]
    InvalidSize { cols: u16, rows: u16 },

    /// 写入数据过大
    #[error("写入数据过大: {0} 字节")]
    WriteTooLarge(usize),

    /// 不允许的参数
    #[error("不允许的参数: {0}")]
    DisallowedArgument(String),

    /// 事件订阅失败
    #[error("事件订阅失败: {0}")]
    SubscriptionFailed(String),

    /// 会话已关闭
    #[error("会话已关闭")]
    SessionClosed,

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl From<TerminalError> for String {
    fn from(err: TerminalError) -> Self {
        err.to_string()
    }
}

impl serde::Serialize for TerminalError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
