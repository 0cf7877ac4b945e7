//! 宿主事件定义
//!
//! 进程宿主推送的两类事件：输出数据与状态变更，均携带来源会话 ID。
//! 序列化形态与前端约定一致（`sessionId` / `errorMessage`，数据为 Base64）。

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::session::{SessionId, SessionStatus};

/// 事件名称常量
pub mod event_names {
    /// 输出数据事件
    pub const PTY_DATA: &str = "pty:data";
    /// 状态变更事件
    pub const PTY_STATUS: &str = "pty:status";
}

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Data,
    Status,
}

impl EventKind {
    pub fn event_name(self) -> &'static str {
        match self {
            Self::Data => event_names::PTY_DATA,
            Self::Status => event_names::PTY_STATUS,
        }
    }
}

/// 输出数据事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalDataEvent {
    pub session_id: SessionId,
    #[serde(serialize_with = "encode_base64", deserialize_with = "decode_base64")]
    pub data: Vec<u8>,
}

/// 状态变更事件
///
/// `status` 保留宿主上报的原始字符串，由 [`TerminalStatusEvent::parsed_status`] 统一解析。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalStatusEvent {
    pub session_id: SessionId,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TerminalStatusEvent {
    pub fn new(session_id: SessionId, status: SessionStatus) -> Self {
        Self {
            session_id,
            status: status.as_str().to_string(),
            error_message: None,
        }
    }

    pub fn error(session_id: SessionId, message: impl Into<String>) -> Self {
        Self {
            session_id,
            status: SessionStatus::Error.as_str().to_string(),
            error_message: Some(message.into()),
        }
    }

    /// 解析状态，未知值按 `Error` 处理
    pub fn parsed_status(&self) -> SessionStatus {
        SessionStatus::parse_lenient(&self.status)
    }

    /// 状态是否在已知集合之内
    pub fn is_recognized(&self) -> bool {
        self.status.parse::<SessionStatus>().is_ok()
    }
}

/// 宿主事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Data(TerminalDataEvent),
    Status(TerminalStatusEvent),
}

impl HostEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Data(_) => EventKind::Data,
            Self::Status(_) => EventKind::Status,
        }
    }

    pub fn session_id(&self) -> SessionId {
        match self {
            Self::Data(ev) => ev.session_id,
            Self::Status(ev) => ev.session_id,
        }
    }
}

impl From<TerminalDataEvent> for HostEvent {
    fn from(event: TerminalDataEvent) -> Self {
        Self::Data(event)
    }
}

impl From<TerminalStatusEvent> for HostEvent {
    fn from(event: TerminalStatusEvent) -> Self {
        Self::Status(event)
    }
}

fn encode_base64<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&BASE64.encode(data))
}

fn decode_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    BASE64
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(raw: u64) -> SessionId {
        SessionId::new(raw).unwrap()
    }

    #[test]
    fn test_event_names() {
        assert_eq!(EventKind::Data.event_name(), "pty:data");
        assert_eq!(EventKind::Status.event_name(), "pty:status");
    }

    #[test]
    fn test_data_event_serialize() {
        let event = TerminalDataEvent {
            session_id: sid(3),
            data: b"Hello World".to_vec(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"sessionId":3,"data":"SGVsbG8gV29ybGQ="}"#);
    }

    #[test]
    fn test_data_event_deserialize() {
        let event: TerminalDataEvent =
            serde_json::from_str(r#"{"sessionId":9,"data":"dGVzdA=="}"#).unwrap();
        assert_eq!(event.session_id, sid(9));
        assert_eq!(event.data, b"test");
    }

    #[test]
    fn test_data_event_rejects_bad_base64() {
        let result = serde_json::from_str::<TerminalDataEvent>(r#"{"sessionId":9,"data":"@@"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_status_event_serialize() {
        let json = serde_json::to_string(&TerminalStatusEvent::new(sid(5), SessionStatus::Stopped))
            .unwrap();
        assert_eq!(json, r#"{"sessionId":5,"status":"stopped"}"#);

        let json =
            serde_json::to_string(&TerminalStatusEvent::error(sid(5), "read failed")).unwrap();
        assert_eq!(
            json,
            r#"{"sessionId":5,"status":"error","errorMessage":"read failed"}"#
        );
    }

    #[test]
    fn test_status_event_unknown_status() {
        let event: TerminalStatusEvent =
            serde_json::from_str(r#"{"sessionId":1,"status":"zombie"}"#).unwrap();
        assert!(!event.is_recognized());
        assert_eq!(event.parsed_status(), SessionStatus::Error);
    }

    #[test]
    fn test_host_event_accessors() {
        let event = HostEvent::from(TerminalDataEvent {
            session_id: sid(2),
            data: vec![0x1b],
        });
        assert_eq!(event.kind(), EventKind::Data);
        assert_eq!(event.session_id(), sid(2));
    }
}
