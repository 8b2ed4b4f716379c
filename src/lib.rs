// Library modules
pub mod commands;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod entities;
pub mod error;
pub mod frame;
pub mod listener;
pub mod multiplexer;
pub mod reader;
pub mod send_gate;
pub mod session;
pub mod tlv;

// Re-export commonly used types
pub use commands::ArmMode;
pub use config::Config;
pub use entities::{Area, Door, Input, Output, PanelDescriptor};
pub use error::{Error, Result};
pub use listener::ListenerHandle;
pub use multiplexer::CommandResponse;
pub use session::{MonitorKind, Session, SessionState};
