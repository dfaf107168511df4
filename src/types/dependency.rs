use crate::error::StatefulError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const LOCATOR_SEPARATOR: char = '|';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Inner,
    Container,
    Config,
}

impl DependencyKind {
    fn id_prefix(&self) -> &'static str {
        match self {
            DependencyKind::Inner => "inner",
            DependencyKind::Container => "dependency",
            DependencyKind::Config => "config",
        }
    }
}

/// Where a version lives inside a document.
///
/// On the wire a container locator is the compound string
/// `<arrayPath>|<index>|<capture-regex>`; everything after the second
/// separator belongs to the regex, so alternations survive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldLocator {
    Field(String),
    Container {
        array_path: String,
        index: usize,
        capture: String,
    },
}

impl FieldLocator {
    pub fn field(path: impl Into<String>) -> Self {
        FieldLocator::Field(path.into())
    }

    pub fn container(array_path: impl Into<String>, index: usize, capture: impl Into<String>) -> Self {
        FieldLocator::Container {
            array_path: array_path.into(),
            index,
            capture: capture.into(),
        }
    }
}

impl fmt::Display for FieldLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldLocator::Field(path) => f.write_str(path),
            FieldLocator::Container {
                array_path,
                index,
                capture,
            } => write!(
                f,
                "{array_path}{LOCATOR_SEPARATOR}{index}{LOCATOR_SEPARATOR}{capture}"
            ),
        }
    }
}

impl FromStr for FieldLocator {
    type Err = StatefulError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.contains(LOCATOR_SEPARATOR) {
            if s.is_empty() {
                return Err(StatefulError::InvalidLocator {
                    locator: s.to_string(),
                    reason: "empty path".to_string(),
                });
            }
            return Ok(FieldLocator::Field(s.to_string()));
        }

        let mut parts = s.splitn(3, LOCATOR_SEPARATOR);
        let array_path = parts.next().unwrap_or_default();
        let index = parts.next().unwrap_or_default();
        let capture = parts.next().ok_or_else(|| StatefulError::InvalidLocator {
            locator: s.to_string(),
            reason: "expected <path>|<index>|<regex>".to_string(),
        })?;

        if array_path.is_empty() || capture.is_empty() {
            return Err(StatefulError::InvalidLocator {
                locator: s.to_string(),
                reason: "array path and capture pattern must not be empty".to_string(),
            });
        }

        let index = index
            .parse::<usize>()
            .map_err(|e| StatefulError::InvalidLocator {
                locator: s.to_string(),
                reason: format!("bad container index `{index}`: {e}"),
            })?;

        Ok(FieldLocator::container(array_path, index, capture))
    }
}

impl TryFrom<String> for FieldLocator {
    type Error = StatefulError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldLocator> for String {
    fn from(locator: FieldLocator) -> Self {
        locator.to_string()
    }
}

/// A version-bearing field of a module, as exchanged with the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyDescriptor {
    #[serde(rename = "dependencyid")]
    pub dependency_id: String,
    pub kind: DependencyKind,
    pub filename: String,
    pub path: FieldLocator,
    pub fullname: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl DependencyDescriptor {
    pub fn new(
        kind: DependencyKind,
        filename: impl Into<String>,
        path: FieldLocator,
        fullname: impl Into<String>,
        version: Option<String>,
    ) -> Self {
        let filename = filename.into();
        let dependency_id = format!(
            "{}{LOCATOR_SEPARATOR}{filename}{LOCATOR_SEPARATOR}{path}",
            kind.id_prefix()
        );

        Self {
            dependency_id,
            kind,
            filename,
            path,
            fullname: fullname.into(),
            version,
        }
    }

    /// Same descriptor carrying a new version, as sent back by the host on sync.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}
