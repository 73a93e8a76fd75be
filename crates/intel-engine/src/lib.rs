//! Outbound side of partner-intel: the HTTP bridge to the remote analysis
//! backend and the rate limiter that spaces calls to it.

pub mod bridge;
pub mod error;
pub mod rate_limit;

pub use bridge::{EngineBridge, EvidenceSource, ProbeReport, ENGINE_KEY_HEADER};
pub use error::EngineError;
pub use rate_limit::{RateLimiter, RateWindow};
