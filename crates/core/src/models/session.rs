//! 会话基础类型
//!
//! 包含会话 ID、会话状态、终端大小等纯数据类型。

use std::fmt;
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

/// 会话 ID
///
/// 由进程宿主分配，始终非零。`0` 保留表示"尚未分配"，
/// 在本类型中以 `Option<SessionId>::None` 表达。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(NonZeroU64);

impl SessionId {
    /// 从原始整数创建，`0` 返回 None
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// 获取原始整数值
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<NonZeroU64> for SessionId {
    fn from(value: NonZeroU64) -> Self {
        Self(value)
    }
}

/// 会话状态
///
/// `Starting` 为初始状态；`Stopped` 与 `Error` 对单个会话实例是终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Starting,
    Running,
    Stopped,
    Error,
}

impl SessionStatus {
    /// 解析宿主上报的状态字符串
    ///
    /// 已知集合之外的任何值都映射为 `Error`。
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or(Self::Error)
    }

    /// 是否为终态
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starting" => Ok(Self::Starting),
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            "error" => Ok(Self::Error),
            other => Err(format!("未知会话状态: {other}")),
        }
    }
}

/// 控制器对外暴露的状态快照
///
/// 由状态观察者（状态栏等 UI）订阅。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStatus {
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ControllerStatus {
    pub fn new(status: SessionStatus) -> Self {
        Self {
            status,
            error_message: None,
        }
    }

    pub fn error(message: Option<String>) -> Self {
        Self {
            status: SessionStatus::Error,
            error_message: message,
        }
    }
}

/// 终端大小（列 × 行）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TermSize {
    /// 列数
    pub cols: u16,
    /// 行数
    pub rows: u16,
}

impl TermSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// 任一维度为 0 即视为空尺寸，宿主不接受空尺寸
    pub fn is_empty(self) -> bool {
        self.cols == 0 || self.rows == 0
    }
}

impl Default for TermSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

impl fmt::Display for TermSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_zero_is_unset() {
        assert!(SessionId::new(0).is_none());
        assert_eq!(SessionId::new(7).map(SessionId::get), Some(7));
    }

    #[test]
    fn test_session_id_serde() {
        let id = SessionId::new(42).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        assert_eq!(serde_json::from_str::<SessionId>("42").unwrap(), id);
        assert!(serde_json::from_str::<SessionId>("0").is_err());
    }

    #[test]
    fn test_session_status_default() {
        assert_eq!(SessionStatus::default(), SessionStatus::Starting);
    }

    #[test]
    fn test_session_status_serialize() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Starting).unwrap(),
            "\"starting\""
        );
        assert_eq!(
            serde_json::to_string(&SessionStatus::Stopped).unwrap(),
            "\"stopped\""
        );
    }

    #[test]
    fn test_session_status_parse_lenient() {
        assert_eq!(SessionStatus::parse_lenient("running"), SessionStatus::Running);
        assert_eq!(SessionStatus::parse_lenient("stopped"), SessionStatus::Stopped);
        assert_eq!(SessionStatus::parse_lenient("zombie"), SessionStatus::Error);
        assert_eq!(SessionStatus::parse_lenient(""), SessionStatus::Error);
        assert_eq!(SessionStatus::parse_lenient("RUNNING"), SessionStatus::Error);
    }

    #[test]
    fn test_session_status_terminal() {
        assert!(!SessionStatus::Starting.is_terminal());
        assert!(!SessionStatus::Running.is_terminal());
        assert!(SessionStatus::Stopped.is_terminal());
        assert!(SessionStatus::Error.is_terminal());
    }

    #[test]
    fn test_controller_status_serialize() {
        let json = serde_json::to_string(&ControllerStatus::error(Some("boom".into()))).unwrap();
        assert_eq!(json, r#"{"status":"error","errorMessage":"boom"}"#);

        let json = serde_json::to_string(&ControllerStatus::new(SessionStatus::Running)).unwrap();
        assert_eq!(json, r#"{"status":"running"}"#);
    }

    #[test]
    fn test_term_size_empty() {
        assert!(TermSize::new(0, 24).is_empty());
        assert!(TermSize::new(80, 0).is_empty());
        assert!(!TermSize::default().is_empty());
        assert_eq!(TermSize::new(120, 40).to_string(), "120x40");
    }
}
