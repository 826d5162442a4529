#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unknown input(s) for tool '{tool}': {}", names.join(", "))]
    UnknownInputs { tool: String, names: Vec<String> },

    #[error("Invocation targets '{requested}' but the resolved tool is '{resolved}'")]
    ToolMismatch { requested: String, resolved: String },
}
