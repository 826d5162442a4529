//! Tool catalog model.
//!
//! [`Project`] and [`ToolDescriptor`] are read-only views of what the
//! remote service publishes. They are rebuilt wholesale on every catalog
//! refresh; the only identity preserved across refreshes is the
//! `(project, name)` pair returned by [`ToolDescriptor::key`].

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// A namespace of tools registered with the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub tools_count: usize,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

// ---------------------------------------------------------------------------
// ParamKind
// ---------------------------------------------------------------------------

/// Abstract parameter kind declared by a tool.
///
/// The set of kinds is owned by the remote service and may grow before
/// this client is updated, so parsing never fails: anything unrecognised
/// lands in [`ParamKind::Unknown`] with the raw value preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParamKind {
    Raster,
    Vector,
    String,
    Integer,
    Float,
    Boolean,
    Folder,
    File,
    Unknown(String),
}

impl ParamKind {
    /// Parse a kind as published by the service.
    ///
    /// Matching is case-insensitive and accepts the short spellings the
    /// service emits (`int`, `bool`) alongside the long ones.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "raster" => Self::Raster,
            "vector" => Self::Vector,
            "string" | "str" => Self::String,
            "integer" | "int" => Self::Integer,
            "float" | "double" => Self::Float,
            "boolean" | "bool" => Self::Boolean,
            "folder" | "directory" => Self::Folder,
            "file" => Self::File,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Raster => "raster",
            Self::Vector => "vector",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Folder => "folder",
            Self::File => "file",
            Self::Unknown(raw) => raw,
        }
    }

    /// Whether `value` is an acceptable default for this kind.
    ///
    /// Spatial and path kinds take their defaults as strings (a path or
    /// data source URI). Unknown kinds degrade to string, matching the
    /// host type they map to.
    pub fn accepts(&self, value: &serde_json::Value) -> bool {
        match self {
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Raster
            | Self::Vector
            | Self::String
            | Self::Folder
            | Self::File
            | Self::Unknown(_) => value.is_string(),
        }
    }
}

impl From<String> for ParamKind {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<ParamKind> for String {
    fn from(kind: ParamKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ParameterSpec
// ---------------------------------------------------------------------------

/// Which side of a tool's contract a parameter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Input,
    Output,
}

/// Normalized declaration of one tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub label: String,
    pub kind: ParamKind,
    pub required: bool,
    /// Default value, already checked against `kind` by the registry.
    pub default: Option<serde_json::Value>,
    pub description: Option<String>,
    /// Enumerated options; only meaningful for string parameters.
    pub choices: Vec<String>,
}

impl ParameterSpec {
    /// A required parameter with no default, labelled by its name.
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            kind,
            required: true,
            default: None,
            description: None,
            choices: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_choices(mut self, choices: Vec<String>) -> Self {
        self.choices = choices;
        self
    }
}

// ---------------------------------------------------------------------------
// ToolDescriptor
// ---------------------------------------------------------------------------

/// Host-agnostic invocation contract of one remote tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub project: String,
    pub name: String,
    pub label: String,
    pub description: String,
    pub inputs: Vec<ParameterSpec>,
    pub outputs: Vec<ParameterSpec>,
}

impl ToolDescriptor {
    /// Identity of the tool across catalog refreshes.
    pub fn key(&self) -> (&str, &str) {
        (&self.project, &self.name)
    }

    /// Host-facing operation id, `{project}_{tool}`.
    pub fn operation_id(&self) -> String {
        format!("{}_{}", self.project, self.name)
    }

    /// Look up a declared input by name.
    pub fn input(&self, name: &str) -> Option<&ParameterSpec> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Parameters on one side of the contract.
    pub fn parameters(&self, direction: Direction) -> &[ParameterSpec] {
        match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_short_and_long_spellings() {
        assert_eq!(ParamKind::parse("int"), ParamKind::Integer);
        assert_eq!(ParamKind::parse("integer"), ParamKind::Integer);
        assert_eq!(ParamKind::parse("bool"), ParamKind::Boolean);
        assert_eq!(ParamKind::parse("Boolean"), ParamKind::Boolean);
        assert_eq!(ParamKind::parse(" RASTER "), ParamKind::Raster);
    }

    #[test]
    fn unrecognised_kind_keeps_raw_value() {
        let kind = ParamKind::parse("pointcloud");
        assert_eq!(kind, ParamKind::Unknown("pointcloud".into()));
        assert_eq!(kind.as_str(), "pointcloud");
    }

    #[test]
    fn kind_deserializes_from_plain_string() {
        let kind: ParamKind = serde_json::from_str("\"float\"").unwrap();
        assert_eq!(kind, ParamKind::Float);
        let json = serde_json::to_string(&ParamKind::Folder).unwrap();
        assert_eq!(json, "\"folder\"");
    }

    #[test]
    fn accepts_matches_json_types() {
        assert!(ParamKind::Integer.accepts(&serde_json::json!(3)));
        assert!(!ParamKind::Integer.accepts(&serde_json::json!(3.5)));
        assert!(ParamKind::Float.accepts(&serde_json::json!(3)));
        assert!(ParamKind::Boolean.accepts(&serde_json::json!(false)));
        assert!(!ParamKind::Boolean.accepts(&serde_json::json!("false")));
        assert!(ParamKind::Raster.accepts(&serde_json::json!("/data/dem.tif")));
        assert!(ParamKind::Unknown("x".into()).accepts(&serde_json::json!("v")));
    }

    #[test]
    fn operation_id_joins_project_and_tool() {
        let tool = ToolDescriptor {
            project: "hydro".into(),
            name: "fill_sinks".into(),
            label: "Fill Sinks".into(),
            description: String::new(),
            inputs: vec![ParameterSpec::new("dem", ParamKind::Raster)],
            outputs: vec![],
        };
        assert_eq!(tool.operation_id(), "hydro_fill_sinks");
        assert_eq!(tool.key(), ("hydro", "fill_sinks"));
        assert!(tool.input("dem").is_some());
        assert!(tool.input("missing").is_none());
        assert_eq!(tool.parameters(Direction::Output).len(), 0);
    }
}
