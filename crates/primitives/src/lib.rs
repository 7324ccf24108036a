//! Small stateless helpers: numeric clamping/wrapping and string utilities.

/// Numeric clamping and index wrapping.
pub mod numbers;
/// String escaping and grapheme cluster lookup.
pub mod strings;

pub use numbers::{clamp, clamp_step, wrap_index};
pub use strings::{escape_regex, grapheme_at, grapheme_before};
