//! Typed plugin manifest
//!
//! Wire names are fixed by the launcher: `pkgName`, `version`, `cmds` and an
//! optional `_metadata` block. Required fields are optional here so that a
//! manifest missing them still parses and the validator can report every
//! problem in one pass. Unknown keys land in `extra`.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub type ExtraFields = BTreeMap<String, serde_json::Value>;

/// Top-level plugin descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "pkgName", default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,

    #[serde(
        default,
        deserialize_with = "scalar_as_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,

    #[serde(rename = "cmds", default)]
    pub commands: Vec<Command>,

    #[serde(rename = "_metadata", default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,

    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// One invocable entry exposed by a plugin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(default)]
    pub name: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<CommandKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcommands: Vec<Command>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<Flag>,

    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Command type. Unrecognized strings are kept so validation can name them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CommandKind {
    Executable,
    Alias,
    Group,
    Unknown(String),
}

impl CommandKind {
    pub fn as_str(&self) -> &str {
        match self {
            CommandKind::Executable => "executable",
            CommandKind::Alias => "alias",
            CommandKind::Group => "group",
            CommandKind::Unknown(other) => other,
        }
    }
}

impl From<String> for CommandKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "executable" => CommandKind::Executable,
            "alias" => CommandKind::Alias,
            "group" => CommandKind::Group,
            _ => CommandKind::Unknown(value),
        }
    }
}

impl From<CommandKind> for String {
    fn from(kind: CommandKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,

    #[serde(default, alias = "usage", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,

    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Optional descriptive block (`_metadata`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(flatten)]
    pub extra: ExtraFields,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl Manifest {
    /// `pkgName`, if present and non-blank
    pub fn name(&self) -> Option<&str> {
        non_empty(self.package_name.as_ref())
    }

    /// `version`, if present and non-blank
    pub fn version(&self) -> Option<&str> {
        non_empty(self.version.as_ref())
    }

    pub fn first_command(&self) -> Option<&Command> {
        self.commands.first()
    }

    pub fn author(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| non_empty(m.author.as_ref()))
    }

    pub fn license(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| non_empty(m.license.as_ref()))
    }

    pub fn homepage(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| non_empty(m.homepage.as_ref()))
    }

    pub fn repository(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| non_empty(m.repository.as_ref()))
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.metadata
            .iter()
            .flat_map(|m| m.tags.iter().map(String::as_str))
    }

    /// Description from `_metadata`, falling back to the first command's `short`
    pub fn description(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| non_empty(m.description.as_ref()))
            .or_else(|| {
                self.first_command()
                    .and_then(|c| non_empty(c.short.as_ref()))
            })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
}

/// YAML happily reads `version: 1.2` as a float; keep it as text so the
/// validator reports it instead of the parser rejecting the whole file.
fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Scalar> = Option::deserialize(deserializer)?;
    Ok(value.map(|scalar| match scalar {
        Scalar::Text(s) => s,
        Scalar::Integer(i) => i.to_string(),
        Scalar::Float(f) => f.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_kind_round_trip() {
        assert_eq!(CommandKind::from("group".to_string()), CommandKind::Group);
        assert_eq!(
            CommandKind::from("script".to_string()),
            CommandKind::Unknown("script".to_string())
        );
        assert_eq!(String::from(CommandKind::Alias), "alias");
    }

    #[test]
    fn test_description_falls_back_to_short() {
        let manifest = Manifest {
            commands: vec![Command {
                name: "demo".to_string(),
                short: Some("Run the demo".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(manifest.description(), Some("Run the demo"));
    }

    #[test]
    fn test_blank_name_is_absent() {
        let manifest = Manifest {
            package_name: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(manifest.name(), None);
    }
}
