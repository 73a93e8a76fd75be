//! HTTP surface for partner-intel.
//!
//! A single in-process session behind an async mutex: chat turns, the
//! transcript, the evidence slot (as JSON or a rendered table), a session
//! reset, a health check and the embedded chat page.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
