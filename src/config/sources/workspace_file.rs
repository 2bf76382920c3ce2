//! Workspace config file source: config/config.toml and config/{env}.toml

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::File;
use std::path::{Path, PathBuf};

/// Environment variable selecting the env-specific workspace file.
pub const ENV_NAME_VAR: &str = "BOOKWISE_ENV";

pub const DEFAULT_ENV_NAME: &str = "development";

/// Candidate files in precedence order, lowest first.
fn candidates(workspace_root: &Path, env_name: &str) -> [PathBuf; 2] {
    let config_dir = workspace_root.join("config");
    [
        config_dir.join("config.toml"),
        config_dir.join(format!("{}.toml", env_name)),
    ]
}

/// Add whichever workspace files exist to the builder.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
    env_name: &str,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(candidates(workspace_root, env_name)
        .iter()
        .filter(|path| path.is_file())
        .fold(builder, |builder, path| {
            builder.add_source(File::from(path.as_path()).required(false))
        }))
}
