use std::collections::HashMap;

use owo_colors::OwoColorize;
use regex::Regex;

use crate::cli::CheckConfigArgs;
use crate::core::config::loader;
use crate::core::config::types::{CopierConfig, PatternKind};
use crate::core::rules::pattern::{VAR_MATCHED_PATTERN, VAR_MATCHED_PREFIX, VAR_RELATIVE_PATH};
use crate::core::rules::transform;
use crate::error::{CliError, Result};

const PROBE_PATH: &str = "sample/file.txt";

/// Loads and validates the workflow configuration, printing a per-rule
/// summary. Returns a process exit code.
pub fn run(args: &CheckConfigArgs) -> Result<i32> {
    let workflows = match loader::load(&args.config_file, args.config_dialect) {
        Ok(workflows) => workflows,
        Err(e) => {
            eprintln!("{} {}", "Invalid configuration:".red().bold(), e);
            return Ok(1);
        }
    };

    if let Err(e) = probe_templates(&workflows) {
        eprintln!("{} {}", "Invalid configuration:".red().bold(), e);
        return Ok(1);
    }

    println!(
        "{} {} ({} workflow(s))",
        "OK".green().bold(),
        args.config_file.display(),
        workflows.len()
    );

    for workflow in &workflows {
        println!(
            "\n{} {} (branch {})",
            "workflow".bold(),
            workflow.source_repo,
            workflow.source_branch
        );
        for rule in &workflow.copy_rules {
            println!(
                "  {} {} ({:?} '{}'{})",
                "rule".cyan(),
                rule.name,
                rule.source.kind,
                rule.source.pattern,
                if rule.source.exclude.is_empty() {
                    String::new()
                } else {
                    format!(", {} exclude(s)", rule.source.exclude.len())
                }
            );
            for target in &rule.targets {
                println!(
                    "    -> {}@{} via {} ({:?})",
                    target.repo,
                    target.branch,
                    target.path_transform,
                    target.commit_strategy.kind
                );
            }
        }
    }

    Ok(0)
}

/// Renders every target path template against the variables its rule's
/// dialect can provide, so an unresolvable placeholder surfaces here
/// instead of at the first webhook.
fn probe_templates(workflows: &[CopierConfig]) -> std::result::Result<(), CliError> {
    for workflow in workflows {
        for rule in &workflow.copy_rules {
            let variables = probe_variables(rule.source.kind, &rule.source.pattern);
            for target in &rule.targets {
                transform::render_target_path(PROBE_PATH, &target.path_transform, &variables)?;
            }
        }
    }
    Ok(())
}

fn probe_variables(kind: PatternKind, pattern: &str) -> HashMap<String, String> {
    let mut variables = HashMap::new();
    match kind {
        PatternKind::Prefix => {
            variables.insert(VAR_MATCHED_PREFIX.to_string(), pattern.to_string());
            variables.insert(VAR_RELATIVE_PATH.to_string(), PROBE_PATH.to_string());
        }
        PatternKind::Glob => {
            variables.insert(VAR_MATCHED_PATTERN.to_string(), pattern.to_string());
        }
        PatternKind::Regex => {
            // The pattern compiled during load validation; its named
            // groups are exactly the variables a match will bind.
            if let Ok(re) = Regex::new(pattern) {
                for name in re.capture_names().flatten() {
                    variables.insert(name.to_string(), PROBE_PATH.to_string());
                }
            }
        }
    }
    variables
}
