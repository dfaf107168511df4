use regex::{Captures, Regex};
use serde_yaml::{Mapping, Value};

use crate::config::VariableMap;
use crate::error::Result;
use crate::store::scalar_to_string;

/// Replaces `${name}` tokens with resolved variables.
pub struct Substituter {
    token_regex: Regex,
}

impl Substituter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            token_regex: Regex::new(r"\$\{\s*([^${}\s]+)\s*\}")?,
        })
    }

    /// Variable names referenced by `template`, in first-use order.
    pub fn referenced(&self, template: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for caps in self.token_regex.captures_iter(template) {
            let name = &caps[1];
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Substitutes every token, or returns all names missing from `variables`.
    pub fn substitute(
        &self,
        template: &str,
        variables: &VariableMap,
    ) -> std::result::Result<String, Vec<String>> {
        let missing: Vec<String> = self
            .referenced(template)
            .into_iter()
            .filter(|name| !variables.contains_key(name))
            .collect();
        if !missing.is_empty() {
            return Err(missing);
        }

        Ok(self
            .token_regex
            .replace_all(template, |caps: &Captures| {
                variables.get(&caps[1]).cloned().unwrap_or_default()
            })
            .into_owned())
    }

    /// Substitutes inside every string of an already parsed template.
    ///
    /// A string that is exactly one token takes the variable's YAML type only
    /// when that type prints back to the same text (`5432`, `true`); anything
    /// else (`1.10`, `1e3`, `0755`, `yes`) stays a string. Callers check for
    /// missing names first; unknown tokens are left as they are.
    pub fn substitute_value(&self, template: &Value, variables: &VariableMap) -> Value {
        match template {
            Value::String(text) => match self.whole_token(text) {
                Some(name) => match variables.get(name) {
                    Some(value) => typed_scalar(value),
                    None => template.clone(),
                },
                None => Value::String(self.replace_known(text, variables)),
            },
            Value::Sequence(items) => Value::Sequence(
                items
                    .iter()
                    .map(|item| self.substitute_value(item, variables))
                    .collect(),
            ),
            Value::Mapping(map) => {
                let mut substituted = Mapping::new();
                for (key, value) in map {
                    let key = match key {
                        Value::String(text) => Value::String(self.replace_known(text, variables)),
                        other => other.clone(),
                    };
                    substituted.insert(key, self.substitute_value(value, variables));
                }
                Value::Mapping(substituted)
            }
            Value::Tagged(tagged) => {
                let mut tagged = tagged.as_ref().clone();
                tagged.value = self.substitute_value(&tagged.value, variables);
                Value::Tagged(Box::new(tagged))
            }
            scalar => scalar.clone(),
        }
    }

    fn whole_token<'a>(&self, text: &'a str) -> Option<&'a str> {
        let caps = self.token_regex.captures(text)?;
        let token = caps.get(0)?;
        if token.start() == 0 && token.end() == text.len() {
            caps.get(1).map(|name| name.as_str())
        } else {
            None
        }
    }

    fn replace_known(&self, text: &str, variables: &VariableMap) -> String {
        self.token_regex
            .replace_all(text, |caps: &Captures| match variables.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

fn typed_scalar(raw: &str) -> Value {
    match serde_yaml::from_str::<Value>(raw) {
        Ok(parsed @ (Value::Bool(_) | Value::Number(_)))
            if scalar_to_string(&parsed).as_deref() == Some(raw) =>
        {
            parsed
        }
        _ => Value::String(raw.to_string()),
    }
}
