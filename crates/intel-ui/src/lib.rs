//! Presentation for partner-intel: the evidence renderer and the embedded
//! chat page.
//!
//! - [`evidence`]: projects an [`EvidenceRecord`](intel_core::types::EvidenceRecord)
//!   into an HTML fragment, a Markdown table or a terminal table, with every
//!   source URL rendered as a clickable link.
//! - [`dashboard`]: self-contained chat page served from `/ui`, embedded at
//!   compile time via `include_str!`.

pub mod dashboard;
pub mod evidence;

pub use evidence::{render, RenderFormat, NO_EVIDENCE_TEXT, NO_QUOTES_TEXT};
