//! Merge rules: defaults, override order, conflict handling.
//!
//! Later sources replace individual keys of earlier ones; tables are merged
//! key by key, never replaced wholesale. Defaults live only in the serde
//! `default` attributes of the config types, so a key no layer sets falls
//! back to the same value as `BookwiseConfig::default()`.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;

/// Create the empty builder every layer is added to.
pub fn layered_builder() -> ConfigBuilder<DefaultState> {
    Config::builder()
}
