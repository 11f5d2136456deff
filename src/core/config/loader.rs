use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::Deserialize;

use super::types::{ConfigValidationError, CopierConfig};

/// How the configuration file on disk is shaped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ConfigDialect {
    /// A single workflow file: `source_repo`, `source_branch`, `copy_rules`.
    #[default]
    Workflow,
    /// A main config whose `workflows` list references workflow files by
    /// path (relative paths resolve against the main file's directory).
    Main,
}

#[derive(Debug, Deserialize)]
struct MainConfig {
    workflows: Vec<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Read(#[from] config::ConfigError),

    #[error(transparent)]
    Validation(#[from] ConfigValidationError),

    #[error("main configuration lists no workflows")]
    NoWorkflows,
}

/// Loads and validates the workflow configuration. Every returned
/// workflow has passed `CopierConfig::validate`.
pub fn load(path: &Path, dialect: ConfigDialect) -> Result<Vec<CopierConfig>, ConfigLoadError> {
    let workflows = match dialect {
        ConfigDialect::Workflow => vec![load_workflow(path)?],
        ConfigDialect::Main => {
            let main: MainConfig = read_file(path)?;
            if main.workflows.is_empty() {
                return Err(ConfigLoadError::NoWorkflows);
            }

            let base = path.parent().unwrap_or_else(|| Path::new("."));
            let mut workflows = Vec::with_capacity(main.workflows.len());
            for reference in &main.workflows {
                let resolved = if reference.is_absolute() {
                    reference.clone()
                } else {
                    base.join(reference)
                };
                workflows.push(load_workflow(&resolved)?);
            }
            workflows
        }
    };

    Ok(workflows)
}

fn load_workflow(path: &Path) -> Result<CopierConfig, ConfigLoadError> {
    let workflow: CopierConfig = read_file(path)?;
    workflow.validate()?;
    Ok(workflow)
}

fn read_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::from(path))
        .build()?
        .try_deserialize()
}
