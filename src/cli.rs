//! CLI domain: parse, route, output, and presentation only.
//! No domain orchestration; the route table dispatches to the generation service.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::{exit_code, map_error};
pub use parse::{Cli, Commands};
pub use presentation::{
    format_generation_json, format_generation_text, format_status_json, format_status_text,
};
pub use route::{busy_output, until_interrupted, RunContext};
