//! Configuration loader: layers sources and deserializes the result.

use crate::config::merge::merge_policy;
use crate::config::sources::{environment, global_file, workspace_file};
use crate::config::BookwiseConfig;
use config::ConfigError;
use config::File;
use std::path::Path;

/// Loads [`BookwiseConfig`].
///
/// Precedence, lowest to highest:
/// 1. built-in defaults
/// 2. global file (`$XDG_CONFIG_HOME/bookwise/config.toml`)
/// 3. workspace `config/config.toml`, then `config/{BOOKWISE_ENV}.toml`
/// 4. environment (`BOOKWISE_<SECTION>__<KEY>`, `OPENAI_API_KEY`, `LLM_*`,
///    `OPENLIBRARY_BASE_URL`)
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace from every source.
    pub fn load(workspace_root: &Path) -> Result<BookwiseConfig, ConfigError> {
        let global = global_file::global_config_path();
        Self::load_layers(workspace_root, global.as_deref(), &|name| {
            std::env::var(name).ok()
        })
    }

    /// Load with an explicit global file and variable lookup.
    pub fn load_layers(
        workspace_root: &Path,
        global_config: Option<&Path>,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<BookwiseConfig, ConfigError> {
        let env_name = env(workspace_file::ENV_NAME_VAR)
            .unwrap_or_else(|| workspace_file::DEFAULT_ENV_NAME.to_string());

        let builder = merge_policy::layered_builder();
        let builder = global_file::add_to_builder(builder, global_config)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root, &env_name)?;
        let builder = environment::add_to_builder(builder, env)?;

        builder.build()?.try_deserialize()
    }

    /// Load a single file on top of the defaults. The file must exist.
    pub fn load_from_file(path: &Path) -> Result<BookwiseConfig, ConfigError> {
        merge_policy::layered_builder()
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()
    }
}
