//! HTTP API handlers for reelpress-server
//!
//! - `POST /api/export/init`, `/api/export/chunk`, `/api/export/finalize`
//! - `POST /api/import/youtube`
//! - `GET /api/health`

pub mod export;
pub mod health;
pub mod import;
pub mod session_id;

pub use export::export_routes;
pub use health::health_routes;
pub use import::import_routes;
pub use session_id::{resolve_session_id, SessionQuery, SESSION_ID_HEADER, SESSION_ID_QUERY};
