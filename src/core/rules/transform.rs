//! Target path rendering.
//!
//! Substitutes `${name}` placeholders in a target path template using the
//! variables captured by the matcher plus built-ins derived from the
//! source path. Unlike message templates, an unresolved placeholder here
//! is an error: a half-rendered path must never reach a commit.

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").unwrap());

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("template '{template}' has unresolved placeholders: {}", missing.join(", "))]
    Unresolved {
        template: String,
        missing: Vec<String>,
    },
}

/// Renders the target path for `source_path` through `template`.
///
/// Substitution is one-pass: replacement values are not re-scanned for
/// further placeholders.
pub fn render_target_path(
    source_path: &str,
    template: &str,
    variables: &HashMap<String, String>,
) -> Result<String, TransformError> {
    let context = build_context(source_path, variables);

    let mut missing = Vec::new();
    let rendered = PLACEHOLDER.replace_all(template, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match context.get(name) {
            Some(value) => value.clone(),
            None => {
                if !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
                caps[0].to_string()
            }
        }
    });

    if !missing.is_empty() {
        return Err(TransformError::Unresolved {
            template: template.to_string(),
            missing,
        });
    }

    Ok(rendered.into_owned())
}

/// Matcher variables plus path-derived built-ins. Matcher variables win on
/// a name collision so rules can override the derived values.
fn build_context(
    source_path: &str,
    variables: &HashMap<String, String>,
) -> HashMap<String, String> {
    let path = Path::new(source_path);
    let mut context = HashMap::new();

    context.insert("path".to_string(), source_path.to_string());
    context.insert(
        "filename".to_string(),
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    );
    context.insert(
        "file_stem".to_string(),
        path.file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    );
    context.insert(
        "extension".to_string(),
        path.extension()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    );
    context.insert(
        "dir".to_string(),
        path.parent()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    );

    for (name, value) in variables {
        context.insert(name.clone(), value.clone());
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_matcher_variables() {
        let rendered = render_target_path(
            "examples/test.js",
            "docs/${relative_path}",
            &vars(&[("relative_path", "test.js")]),
        )
        .unwrap();
        assert_eq!(rendered, "docs/test.js");
    }

    #[test]
    fn substitutes_path_builtins() {
        let rendered = render_target_path(
            "examples/sub/query.py",
            "snippets/${dir}/${file_stem}.${extension}",
            &vars(&[]),
        )
        .unwrap();
        assert_eq!(rendered, "snippets/examples/sub/query.py");
    }

    #[test]
    fn filename_builtin() {
        let rendered =
            render_target_path("a/b/c.txt", "out/${filename}", &vars(&[])).unwrap();
        assert_eq!(rendered, "out/c.txt");
    }

    #[test]
    fn unresolved_placeholder_is_an_error_listing_names() {
        let err = render_target_path("a.js", "x/${nope}/${also_nope}", &vars(&[]))
            .unwrap_err();
        let TransformError::Unresolved { missing, .. } = err;
        assert_eq!(missing, vec!["nope".to_string(), "also_nope".to_string()]);
    }

    #[test]
    fn matcher_variables_override_builtins() {
        let rendered = render_target_path(
            "a/b.js",
            "${filename}",
            &vars(&[("filename", "custom.js")]),
        )
        .unwrap();
        assert_eq!(rendered, "custom.js");
    }

    #[test]
    fn substitution_is_not_recursive() {
        let rendered = render_target_path(
            "a.js",
            "${inner}",
            &vars(&[("inner", "${outer}"), ("outer", "x")]),
        )
        .unwrap();
        assert_eq!(rendered, "${outer}");
    }

    #[test]
    fn template_without_placeholders_passes_through() {
        let rendered = render_target_path("a.js", "fixed/location.js", &vars(&[])).unwrap();
        assert_eq!(rendered, "fixed/location.js");
    }
}
