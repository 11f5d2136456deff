//! Source path matching for copy rules.
//!
//! Three dialects are supported: literal prefixes, globs (with `**`
//! support) and regexes with named capture groups. A positive match yields
//! the variables consumed by the path transformer and message templater.

use std::collections::HashMap;

use glob::{MatchOptions, Pattern};
use regex::Regex;
use thiserror::Error;

use crate::core::config::types::{PatternKind, SourcePattern};

pub const VAR_MATCHED_PREFIX: &str = "matched_prefix";
pub const VAR_RELATIVE_PATH: &str = "relative_path";
pub const VAR_MATCHED_PATTERN: &str = "matched_pattern";

#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    pub matched: bool,
    pub variables: HashMap<String, String>,
}

impl MatchResult {
    fn no_match() -> Self {
        Self::default()
    }

    fn with_variables(variables: HashMap<String, String>) -> Self {
        Self {
            matched: true,
            variables,
        }
    }
}

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,

    #[error("invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid exclude pattern '{pattern}': {source}")]
    InvalidExclude {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Compile-checks a pattern ahead of matching. Called from config
/// validation so that `matches` can treat compile failures as a plain
/// no-match.
pub fn validate(source: &SourcePattern) -> Result<(), PatternError> {
    if source.pattern.is_empty() {
        return Err(PatternError::Empty);
    }

    if source.kind == PatternKind::Regex {
        Regex::new(&source.pattern).map_err(|e| PatternError::InvalidRegex {
            pattern: source.pattern.clone(),
            source: e,
        })?;
    }

    for exclude in &source.exclude {
        if exclude.is_empty() {
            return Err(PatternError::Empty);
        }
        Regex::new(exclude).map_err(|e| PatternError::InvalidExclude {
            pattern: exclude.clone(),
            source: e,
        })?;
    }

    Ok(())
}

/// Matches `path` against the rule's source pattern.
///
/// Exclude patterns dominate: any exclude hit flips a positive match back
/// to unmatched. Compilation failures never panic or error here; they
/// produce a no-match (validation reports them at config load).
pub fn matches(path: &str, source: &SourcePattern) -> MatchResult {
    let result = match source.kind {
        PatternKind::Prefix => match_prefix(path, &source.pattern),
        PatternKind::Glob => match_glob(path, &source.pattern),
        PatternKind::Regex => match_regex(path, &source.pattern),
    };

    if !result.matched {
        return result;
    }

    for exclude in &source.exclude {
        match Regex::new(exclude) {
            Ok(re) => {
                if re.is_match(path) {
                    return MatchResult::no_match();
                }
            }
            // Validation reports this at config load; here it reads as
            // unmatched.
            Err(_) => return MatchResult::no_match(),
        }
    }

    result
}

fn match_prefix(path: &str, pattern: &str) -> MatchResult {
    if pattern.is_empty() {
        return MatchResult::no_match();
    }

    let trimmed = pattern.strip_suffix('/').unwrap_or(pattern);
    if trimmed.is_empty() || !path.starts_with(trimmed) {
        return MatchResult::no_match();
    }

    let mut relative = &path[trimmed.len()..];
    relative = relative.strip_prefix('/').unwrap_or(relative);

    let mut variables = HashMap::new();
    variables.insert(VAR_MATCHED_PREFIX.to_string(), pattern.to_string());
    variables.insert(VAR_RELATIVE_PATH.to_string(), relative.to_string());
    MatchResult::with_variables(variables)
}

fn match_glob(path: &str, pattern: &str) -> MatchResult {
    if pattern.is_empty() {
        return MatchResult::no_match();
    }

    // `glob::Pattern` treats `**` as a path-crossing wildcard only in
    // whole-component position, so patterns carrying `**` go straight to
    // the regex translation, as does anything Pattern rejects.
    let matched = if !pattern.contains("**") {
        match Pattern::new(pattern) {
            Ok(compiled) => {
                let options = MatchOptions {
                    case_sensitive: true,
                    require_literal_separator: true,
                    require_literal_leading_dot: false,
                };
                compiled.matches_with(path, options)
            }
            Err(_) => glob_regex_fallback(path, pattern),
        }
    } else {
        glob_regex_fallback(path, pattern)
    };

    if !matched {
        return MatchResult::no_match();
    }

    let mut variables = HashMap::new();
    variables.insert(VAR_MATCHED_PATTERN.to_string(), pattern.to_string());
    MatchResult::with_variables(variables)
}

/// Translates a glob into an anchored regex: `**` crosses separators,
/// `*` and `?` do not.
fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    out.push('$');
    out
}

fn glob_regex_fallback(path: &str, pattern: &str) -> bool {
    match Regex::new(&glob_to_regex(pattern)) {
        Ok(re) => re.is_match(path),
        Err(_) => false,
    }
}

fn match_regex(path: &str, pattern: &str) -> MatchResult {
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        Err(_) => return MatchResult::no_match(),
    };

    let captures = match re.captures(path) {
        Some(c) => c,
        None => return MatchResult::no_match(),
    };

    // The first match must cover the whole path, not a substring of it.
    let full = captures.get(0).map(|m| (m.start(), m.end()));
    if full != Some((0, path.len())) {
        return MatchResult::no_match();
    }

    let mut variables = HashMap::new();
    for name in re.capture_names().flatten() {
        if let Some(value) = captures.name(name) {
            variables.insert(name.to_string(), value.as_str().to_string());
        }
    }
    MatchResult::with_variables(variables)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(kind: PatternKind, pattern: &str, exclude: &[&str]) -> SourcePattern {
        SourcePattern {
            kind,
            pattern: pattern.to_string(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn prefix_match_extracts_variables() {
        let result = matches(
            "examples/test.js",
            &source(PatternKind::Prefix, "examples/", &[]),
        );
        assert!(result.matched);
        assert_eq!(result.variables[VAR_MATCHED_PREFIX], "examples/");
        assert_eq!(result.variables[VAR_RELATIVE_PATH], "test.js");
    }

    #[test]
    fn prefix_without_trailing_slash_strips_leading_separator() {
        let result = matches(
            "examples/sub/a.py",
            &source(PatternKind::Prefix, "examples", &[]),
        );
        assert!(result.matched);
        assert_eq!(result.variables[VAR_RELATIVE_PATH], "sub/a.py");
    }

    #[test]
    fn prefix_no_match() {
        let result = matches("src/test.js", &source(PatternKind::Prefix, "examples/", &[]));
        assert!(!result.matched);
        assert!(result.variables.is_empty());
    }

    #[test]
    fn exclude_dominates_prefix_match() {
        let result = matches(
            "examples/.gitignore",
            &source(PatternKind::Prefix, "examples/", &[r"\.gitignore$"]),
        );
        assert!(!result.matched);
    }

    #[test]
    fn exclude_applies_to_all_dialects() {
        for src in [
            source(PatternKind::Prefix, "examples/", &["test"]),
            source(PatternKind::Glob, "examples/*.js", &["test"]),
            source(PatternKind::Regex, "^examples/.+$", &["test"]),
        ] {
            assert!(!matches("examples/test.js", &src).matched);
        }
    }

    #[test]
    fn glob_star_does_not_cross_directories() {
        let src = source(PatternKind::Glob, "examples/*.js", &[]);
        assert!(matches("examples/a.js", &src).matched);
        assert!(!matches("examples/nested/a.js", &src).matched);
    }

    #[test]
    fn glob_double_star_crosses_directories() {
        let src = source(PatternKind::Glob, "examples/**/*.js", &[]);
        assert!(matches("examples/a/b/c.js", &src).matched);
        assert!(!matches("src/a/b/c.js", &src).matched);
    }

    #[test]
    fn glob_question_mark_is_single_char() {
        let src = source(PatternKind::Glob, "examples/?.js", &[]);
        assert!(matches("examples/a.js", &src).matched);
        assert!(!matches("examples/ab.js", &src).matched);
        assert!(!matches("examples//.js", &src).matched);
    }

    #[test]
    fn glob_match_emits_pattern_variable() {
        let result = matches("examples/a.js", &source(PatternKind::Glob, "examples/*.js", &[]));
        assert_eq!(result.variables[VAR_MATCHED_PATTERN], "examples/*.js");
    }

    #[test]
    fn regex_named_captures_become_variables() {
        let result = matches(
            "mflix/server/java-spring/src/Main.java",
            &source(
                PatternKind::Regex,
                r"^mflix/server/java-spring/(?P<file>.+)$",
                &[],
            ),
        );
        assert!(result.matched);
        assert_eq!(result.variables["file"], "src/Main.java");
    }

    #[test]
    fn regex_partial_match_is_rejected() {
        let result = matches(
            "prefix/examples/a.js",
            &source(PatternKind::Regex, r"examples/(?P<f>.+)", &[]),
        );
        assert!(!result.matched);
    }

    #[test]
    fn regex_compile_failure_degrades_to_no_match() {
        let result = matches("anything", &source(PatternKind::Regex, "([bad", &[]));
        assert!(!result.matched);
    }

    #[test]
    fn glob_to_regex_escapes_metacharacters() {
        assert_eq!(glob_to_regex("a.b/*.js"), r"^a\.b/[^/]*\.js$");
        assert_eq!(glob_to_regex("a/**/b?"), "^a/.*/b[^/]$");
    }

    #[test]
    fn validate_flags_empty_exclude() {
        let src = source(PatternKind::Prefix, "examples/", &[""]);
        assert!(matches!(validate(&src), Err(PatternError::Empty)));
    }
}
