//! 纯数据类型

pub mod events;
pub mod launch;
pub mod session;

pub use events::{
    event_names, EventKind, HostEvent, TerminalDataEvent, TerminalStatusEvent,
};
pub use launch::{LaunchParams, Settings};
pub use session::{ControllerStatus, SessionId, SessionStatus, TermSize};
