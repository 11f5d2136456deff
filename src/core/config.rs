pub mod loader;
pub mod types;

pub use loader::{ConfigDialect, ConfigLoadError};
pub use types::{
    CommitStrategy, CopierConfig, DeprecationCheck, PatternKind, Rule, SourcePattern,
    StrategyKind, Target,
};
