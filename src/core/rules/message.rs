//! Commit message, PR title and PR body rendering.
//!
//! Message templates substitute a fixed set of built-ins plus the matcher
//! variables. Unlike the path transformer, unresolved placeholders stay
//! literal here: user-authored prose is allowed to contain stray
//! `${...}` sequences.

use std::collections::HashMap;

use crate::core::config::types::Target;

#[derive(Debug, Clone, Default)]
pub struct MessageContext {
    pub rule_name: String,
    pub source_repo: String,
    pub source_branch: String,
    pub target_repo: String,
    pub target_branch: String,
    pub file_count: usize,
    pub pr_number: u64,
    pub commit_sha: String,
    pub variables: HashMap<String, String>,
}

impl MessageContext {
    /// Context with representative values, used to probe templates at
    /// config validation time.
    pub fn probe(rule_name: &str, source_repo: &str, target: &Target) -> Self {
        Self {
            rule_name: rule_name.to_string(),
            source_repo: source_repo.to_string(),
            source_branch: "main".to_string(),
            target_repo: target.repo.clone(),
            target_branch: target.branch.clone(),
            file_count: 1,
            pr_number: 1,
            commit_sha: "0000000".to_string(),
            variables: HashMap::new(),
        }
    }
}

pub fn render_commit_message(template: &str, ctx: &MessageContext) -> String {
    if template.is_empty() {
        return format!("Update code examples from {}", ctx.source_repo);
    }
    render(template, ctx)
}

pub fn render_pr_title(template: &str, ctx: &MessageContext) -> String {
    if template.is_empty() {
        return format!("Update code examples from {}", ctx.source_repo);
    }
    render(template, ctx)
}

pub fn render_pr_body(template: &str, ctx: &MessageContext) -> String {
    if template.is_empty() {
        return format!(
            "Automated update of {} file(s) from {} (PR #{})",
            ctx.file_count, ctx.source_repo, ctx.pr_number
        );
    }
    render(template, ctx)
}

fn render(template: &str, ctx: &MessageContext) -> String {
    let mut out = template.to_string();

    let builtins = [
        ("${rule_name}", ctx.rule_name.clone()),
        ("${source_repo}", ctx.source_repo.clone()),
        ("${target_repo}", ctx.target_repo.clone()),
        ("${source_branch}", ctx.source_branch.clone()),
        ("${target_branch}", ctx.target_branch.clone()),
        ("${file_count}", ctx.file_count.to_string()),
        ("${pr_number}", ctx.pr_number.to_string()),
        ("${commit_sha}", ctx.commit_sha.clone()),
    ];
    for (placeholder, value) in builtins {
        out = out.replace(placeholder, &value);
    }

    for (name, value) in &ctx.variables {
        out = out.replace(&format!("${{{name}}}"), value);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> MessageContext {
        MessageContext {
            rule_name: "python-examples".to_string(),
            source_repo: "octo/source".to_string(),
            source_branch: "main".to_string(),
            target_repo: "octo/docs".to_string(),
            target_branch: "main".to_string(),
            file_count: 3,
            pr_number: 42,
            commit_sha: "abc123".to_string(),
            variables: HashMap::new(),
        }
    }

    #[test]
    fn builtins_are_substituted() {
        let out = render_commit_message(
            "Sync ${file_count} file(s) for ${rule_name} from ${source_repo}",
            &ctx(),
        );
        assert_eq!(out, "Sync 3 file(s) for python-examples from octo/source");
    }

    #[test]
    fn matcher_variables_are_substituted() {
        let mut c = ctx();
        c.variables
            .insert("lang".to_string(), "python".to_string());
        let out = render_pr_title("New ${lang} examples (PR #${pr_number})", &c);
        assert_eq!(out, "New python examples (PR #42)");
    }

    #[test]
    fn empty_commit_template_falls_back() {
        assert_eq!(
            render_commit_message("", &ctx()),
            "Update code examples from octo/source"
        );
    }

    #[test]
    fn empty_title_template_falls_back() {
        assert_eq!(
            render_pr_title("", &ctx()),
            "Update code examples from octo/source"
        );
    }

    #[test]
    fn empty_body_template_falls_back() {
        assert_eq!(
            render_pr_body("", &ctx()),
            "Automated update of 3 file(s) from octo/source (PR #42)"
        );
    }

    #[test]
    fn unresolved_placeholders_stay_literal() {
        let out = render_pr_body("price is ${amount}", &ctx());
        assert_eq!(out, "price is ${amount}");
    }
}
