//! Parameter type mapper.
//!
//! Maps an abstract [`ParameterSpec`] to the descriptor a GIS host needs
//! to render an input widget or a destination picker. The mapping is a
//! pure, total function: unrecognised kinds fall back to a plain string
//! parameter instead of failing.

use serde::{Deserialize, Serialize};

use crate::types::{Direction, ParamKind, ParameterSpec};

/// Name of the synthetic output directory parameter every operation exposes.
pub const OUTPUT_DIR_PARAM: &str = "OUTPUT_DIR";

/// Host widget/value type for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostType {
    RasterLayer,
    VectorLayer,
    String,
    /// A string restricted to a fixed list of choices.
    Enum,
    Integer,
    Double,
    Boolean,
    File,
    Folder,
}

/// Host-specific rendering of one tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostParameterDescriptor {
    pub name: String,
    pub label: String,
    pub host_type: HostType,
    pub required: bool,
    pub default: Option<serde_json::Value>,
    pub description: Option<String>,
    pub choices: Vec<String>,
    /// The host must supply a target path that the job writes to.
    pub destination: bool,
}

/// Map an abstract kind to its host type.
pub fn host_type(kind: &ParamKind, has_choices: bool) -> HostType {
    match kind {
        ParamKind::Raster => HostType::RasterLayer,
        ParamKind::Vector => HostType::VectorLayer,
        ParamKind::String if has_choices => HostType::Enum,
        ParamKind::String => HostType::String,
        ParamKind::Integer => HostType::Integer,
        ParamKind::Float => HostType::Double,
        ParamKind::Boolean => HostType::Boolean,
        ParamKind::File => HostType::File,
        ParamKind::Folder => HostType::Folder,
        ParamKind::Unknown(_) => HostType::String,
    }
}

/// Map an abstract kind to the destination type of an output.
///
/// Layers keep their layer type. File and folder outputs become a
/// folder the job writes into; anything else is written to a file.
pub fn destination_type(kind: &ParamKind) -> HostType {
    match kind {
        ParamKind::Raster => HostType::RasterLayer,
        ParamKind::Vector => HostType::VectorLayer,
        ParamKind::File | ParamKind::Folder => HostType::Folder,
        _ => HostType::File,
    }
}

/// Map a parameter declaration to its host descriptor.
///
/// `required` and `default` are copied verbatim. Output parameters are
/// always destinations, whatever their `required` flag says.
pub fn map_parameter(spec: &ParameterSpec, direction: Direction) -> HostParameterDescriptor {
    let host_type = match direction {
        Direction::Input => host_type(&spec.kind, !spec.choices.is_empty()),
        Direction::Output => destination_type(&spec.kind),
    };

    HostParameterDescriptor {
        name: spec.name.clone(),
        label: spec.label.clone(),
        host_type,
        required: spec.required,
        default: spec.default.clone(),
        description: spec.description.clone(),
        choices: spec.choices.clone(),
        destination: direction == Direction::Output,
    }
}

/// Map every parameter on one side of a tool's contract, in order.
pub fn map_parameters(specs: &[ParameterSpec], direction: Direction) -> Vec<HostParameterDescriptor> {
    specs.iter().map(|s| map_parameter(s, direction)).collect()
}

/// The folder destination that receives a job's output directory.
pub fn output_dir_parameter() -> HostParameterDescriptor {
    HostParameterDescriptor {
        name: OUTPUT_DIR_PARAM.to_string(),
        label: "Output Directory".to_string(),
        host_type: HostType::Folder,
        required: true,
        default: None,
        description: None,
        choices: Vec::new(),
        destination: true,
    }
}
