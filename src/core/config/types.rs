use serde::{Deserialize, Serialize};

use crate::core::rules::message::{self, MessageContext};
use crate::core::rules::pattern;

/// A single workflow: one source repository and the rules that route its
/// files into target repositories.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CopierConfig {
    pub source_repo: String,

    #[serde(default = "default_source_branch")]
    pub source_branch: String,

    #[serde(default)]
    pub copy_rules: Vec<Rule>,
}

fn default_source_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Rule {
    pub name: String,

    pub source: SourcePattern,

    #[serde(default)]
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourcePattern {
    #[serde(rename = "type")]
    pub kind: PatternKind,

    pub pattern: String,

    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Prefix,
    Glob,
    Regex,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Target {
    /// Target repository as `owner/name`.
    pub repo: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// Template for the target path, e.g. `docs/${relative_path}`.
    pub path_transform: String,

    #[serde(default)]
    pub commit_strategy: CommitStrategy,

    #[serde(default)]
    pub deprecation_check: Option<DeprecationCheck>,
}

fn default_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CommitStrategy {
    #[serde(rename = "type", default)]
    pub kind: StrategyKind,

    /// Only meaningful for `pr`; ignored for direct commits.
    #[serde(default)]
    pub auto_merge: bool,

    #[serde(default)]
    pub commit_message: String,

    #[serde(default)]
    pub pr_title: String,

    #[serde(default)]
    pub pr_body: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Direct,
    Pr,
}

impl StrategyKind {
    /// Tag used in the upload key so direct and PR batches never co-mingle.
    pub fn tag(&self) -> &'static str {
        match self {
            StrategyKind::Direct => "direct",
            StrategyKind::Pr => "pr",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeprecationCheck {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_manifest_file")]
    pub file_name: String,
}

fn default_manifest_file() -> String {
    "deprecated_examples.json".to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("rule '{rule}': {source}")]
    Pattern {
        rule: String,
        #[source]
        source: pattern::PatternError,
    },

    #[error("rule '{rule}', target '{repo}': PR title template renders empty")]
    EmptyPrTitle { rule: String, repo: String },

    #[error("duplicate rule name '{0}'")]
    DuplicateRule(String),
}

impl CopierConfig {
    /// Compiles every pattern and checks per-target invariants. Invalid
    /// rules are rejected here so the matcher never has to report
    /// compilation failures at match time.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let mut seen = std::collections::HashSet::new();
        for rule in &self.copy_rules {
            if !seen.insert(rule.name.as_str()) {
                return Err(ConfigValidationError::DuplicateRule(rule.name.clone()));
            }

            pattern::validate(&rule.source).map_err(|source| ConfigValidationError::Pattern {
                rule: rule.name.clone(),
                source,
            })?;

            for target in &rule.targets {
                if target.commit_strategy.kind == StrategyKind::Pr {
                    let probe = MessageContext::probe(&rule.name, &self.source_repo, target);
                    let title = message::render_pr_title(&target.commit_strategy.pr_title, &probe);
                    if title.trim().is_empty() {
                        return Err(ConfigValidationError::EmptyPrTitle {
                            rule: rule.name.clone(),
                            repo: target.repo.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(kind: PatternKind, pattern: &str, exclude: &[&str]) -> Rule {
        Rule {
            name: "r".to_string(),
            source: SourcePattern {
                kind,
                pattern: pattern.to_string(),
                exclude: exclude.iter().map(|s| s.to_string()).collect(),
            },
            targets: vec![],
        }
    }

    fn config_with(rules: Vec<Rule>) -> CopierConfig {
        CopierConfig {
            source_repo: "octo/source".to_string(),
            source_branch: "main".to_string(),
            copy_rules: rules,
        }
    }

    #[test]
    fn validate_accepts_prefix_rule() {
        let cfg = config_with(vec![rule(PatternKind::Prefix, "examples/", &[])]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_pattern() {
        let cfg = config_with(vec![rule(PatternKind::Prefix, "", &[])]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_regex() {
        let cfg = config_with(vec![rule(PatternKind::Regex, "([unclosed", &[])]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_exclude() {
        let cfg = config_with(vec![rule(PatternKind::Prefix, "examples/", &["("])]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_rule_names() {
        let mut first = rule(PatternKind::Prefix, "a/", &[]);
        let mut second = rule(PatternKind::Prefix, "b/", &[]);
        first.name = "dup".to_string();
        second.name = "dup".to_string();
        let cfg = config_with(vec![first, second]);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigValidationError::DuplicateRule(_))
        ));
    }

    #[test]
    fn strategy_defaults_to_direct() {
        let strategy: CommitStrategy = serde_json::from_str("{}").unwrap();
        assert_eq!(strategy.kind, StrategyKind::Direct);
        assert!(!strategy.auto_merge);
    }
}
