//! Data models for reelpress-server
//!
//! - Export session identity and lifecycle state machine

pub mod session;

pub use session::{InvalidTransition, Session, SessionId, SessionState};
