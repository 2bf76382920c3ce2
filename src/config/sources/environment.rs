//! Environment overrides: `BOOKWISE_<SECTION>__<KEY>` plus a few
//! conventional provider variables.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Conventional variables and the config keys they override.
pub const OVERRIDES: [(&str, &str); 5] = [
    ("LLM_TEMPERATURE", "llm.temperature"),
    ("LLM_MAX_OUTPUT_TOKENS", "llm.max_output_tokens"),
    ("LLM_TIMEOUT_SECONDS", "llm.timeout_seconds"),
    ("OPENAI_API_KEY", "llm.api_key"),
    ("OPENLIBRARY_BASE_URL", "openlibrary.base_url"),
];

/// Add prefixed process variables, then apply conventional overrides found
/// through `lookup`. Blank values are ignored.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let mut builder = builder.add_source(
        Environment::with_prefix("BOOKWISE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    for (variable, key) in OVERRIDES {
        if let Some(value) = lookup(variable).filter(|value| !value.trim().is_empty()) {
            builder = builder.set_override(key, value)?;
        }
    }

    Ok(builder)
}
