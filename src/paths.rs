//! Route template normalization.
//!
//! Frameworks spell path parameters three ways: `:name`, `<name>`, and
//! `{name:pattern}`. Consumers keying documentation by path want the
//! canonical `{name}` form for all of them.

use regex::Regex;
use std::sync::OnceLock;

fn pattern_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([^{}:]+):[^{}]+\}").expect("pattern placeholder regex"))
}

fn param_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([^{}]+)\}").expect("param placeholder regex"))
}

/// Converts framework placeholder syntaxes to canonical `{name}` form.
pub fn normalize_template(path: &str) -> String {
    let stripped = pattern_re().replace_all(path, "{$1}");

    stripped
        .split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                format!("{{{}}}", name)
            } else if segment.starts_with('<') && segment.ends_with('>') && segment.len() > 2 {
                format!("{{{}}}", &segment[1..segment.len() - 1])
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Parameter names of a normalized template, in order of appearance.
pub fn extract_params(path: &str) -> Vec<String> {
    let normalized = normalize_template(path);
    param_re()
        .captures_iter(&normalized)
        .map(|caps| caps[1].to_string())
        .collect()
}
