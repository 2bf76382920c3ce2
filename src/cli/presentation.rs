//! CLI presentation: text and json formatters per command.

mod generation;
mod status;

pub use generation::{format_generation_json, format_generation_text};
pub use status::{format_status_json, format_status_text};
