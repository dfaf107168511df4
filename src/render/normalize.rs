//! Scalar fixes applied to rendered manifests.

use regex::Regex;
use serde_yaml::Value;

use crate::error::Result;
use crate::store::{get_path_mut, scalar_to_string};

/// Where container lists live in the manifests this engine renders.
const CONTAINER_PATHS: [&str; 4] = [
    "spec.containers",
    "spec.initContainers",
    "spec.template.spec.containers",
    "spec.template.spec.initContainers",
];

/// Quotes plain scalars that YAML 1.1 consumers read as booleans.
///
/// Runs on serialized output, where such words can only be strings (real
/// booleans print as `true`/`false`). Lines inside `|` and `>` block scalars
/// are literal text and are left alone.
pub struct Yaml11Quoter {
    bool_like: Regex,
    block_start: Regex,
}

impl Yaml11Quoter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            bool_like: Regex::new(
                r#"^(\s*(?:-\s+)*(?:[^\s#'"\-][^#]*?:\s+)?)((?i:y|n|yes|no|on|off))([ \t]*)$"#,
            )?,
            block_start: Regex::new(r"(?:^\s*|:\s+|-\s+)[|>][1-9]?[-+]?[1-9]?[ \t]*$")?,
        })
    }

    pub fn apply(&self, text: &str) -> String {
        let mut quoted = String::with_capacity(text.len() + 16);
        let mut block_base: Option<usize> = None;

        for line in text.split_inclusive('\n') {
            let content = line.trim_end_matches(['\n', '\r']);

            if let Some(base) = block_base {
                if content.trim().is_empty() || indent_of(content) > base {
                    quoted.push_str(line);
                    continue;
                }
                block_base = None;
            }

            if self.block_start.is_match(content) {
                block_base = Some(block_column(content));
                quoted.push_str(line);
                continue;
            }

            match self.bool_like.captures(content) {
                Some(caps) if !caps[1].trim().is_empty() => {
                    quoted.push_str(&caps[1]);
                    quoted.push('"');
                    quoted.push_str(&caps[2]);
                    quoted.push('"');
                    quoted.push_str(&caps[3]);
                    quoted.push_str(&line[content.len()..]);
                }
                _ => quoted.push_str(line),
            }
        }

        quoted
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Column a block scalar's content must be indented past: the owning key, or
/// the dash of a sequence item that is itself the scalar.
fn block_column(line: &str) -> usize {
    let indent = indent_of(line);
    let mut column = indent;
    let mut last_dash = None;
    let mut rest = &line[indent..];

    while let Some(after) = rest.strip_prefix('-') {
        let spaces = after.len() - after.trim_start_matches(' ').len();
        if spaces == 0 {
            break;
        }
        last_dash = Some(column);
        column += 1 + spaces;
        rest = &after[spaces..];
    }

    if rest.starts_with('|') || rest.starts_with('>') {
        last_dash.unwrap_or(indent)
    } else {
        column
    }
}

/// Forces every container `env[].value` to a string. Returns how many changed.
pub fn stringify_env_values(document: &mut Value) -> usize {
    let mut changed = 0;

    for path in CONTAINER_PATHS {
        let Some(Value::Sequence(containers)) = get_path_mut(document, path) else {
            continue;
        };

        for container in containers.iter_mut() {
            let Some(Value::Sequence(env)) = container.get_mut("env") else {
                continue;
            };

            for entry in env.iter_mut() {
                let Some(value) = entry.get_mut("value") else {
                    continue;
                };
                if matches!(value, Value::String(_) | Value::Null) {
                    continue;
                }
                if let Some(text) = scalar_to_string(value) {
                    *value = Value::String(text);
                    changed += 1;
                }
            }
        }
    }

    changed
}
