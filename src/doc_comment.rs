use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// A structured parameter annotation from a handler doc comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDoc {
    pub name: String,
    /// Where the parameter lives: `path`, `query`, `header`, or `body`
    #[serde(rename = "in")]
    pub location: String,
    #[serde(rename = "type")]
    pub param_type: String,
    pub required: bool,
    pub description: String,
}

/// Summary, description, and parameter annotations for one handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandlerInfo {
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub summary: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub parameters: Vec<ParamDoc>,
}

/// Parses a handler's doc comment text.
///
/// The first plain line becomes the summary and the second the description.
/// Lines of the form `@param name in type required "desc"` become
/// structured parameters and do not count as plain lines.
pub fn parse_handler_info(doc: &str) -> HandlerInfo {
    static PARAM_RE: OnceLock<Regex> = OnceLock::new();
    let param_re = PARAM_RE.get_or_init(|| {
        Regex::new(r#"@param\s+(\w+)\s+(\w+)\s+(\w+)\s+(true|false)\s+"([^"]*)""#)
            .expect("param annotation pattern")
    });

    let mut info = HandlerInfo::default();
    let mut plain_lines = 0;

    for line in doc.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = param_re.captures(line) {
            info.parameters.push(ParamDoc {
                name: caps[1].to_string(),
                location: caps[2].to_string(),
                param_type: caps[3].to_string(),
                required: &caps[4] == "true",
                description: caps[5].to_string(),
            });
            continue;
        }
        if line.starts_with('@') {
            continue;
        }

        match plain_lines {
            0 => info.summary = line.to_string(),
            1 => info.description = line.to_string(),
            _ => {}
        }
        plain_lines += 1;
    }

    info
}
