//! Error types shared across Cuelist crates.

/// Top-level error type for Cuelist operations.
#[derive(Debug, thiserror::Error)]
pub enum CuelistError {
    #[error("Unknown set item: {name:?}")]
    UnknownSetItem { name: String },

    #[error("Unknown set operator: {op:?}")]
    UnknownSetOperator { op: String },

    #[error("No compose function registered for {name:?}")]
    MissingCompose { name: String },

    #[error("No resource registered for {name:?}")]
    MissingResource { name: String },

    #[error("No clip factory registered for {name:?}")]
    UnknownClipType { name: String },

    #[error("Invalid clip params: {message}")]
    InvalidParams { message: String },

    #[error("No event at position {position} matches the given clip")]
    EventNotFound { position: f64 },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Failed to load timeline {name:?}: {message}")]
    Load { name: String, message: String },

    #[error("Document error: {message}")]
    Document { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using CuelistError.
pub type CuelistResult<T> = Result<T, CuelistError>;

impl CuelistError {
    pub fn unknown_set_item(name: impl Into<String>) -> Self {
        Self::UnknownSetItem { name: name.into() }
    }

    pub fn unknown_set_operator(op: impl Into<String>) -> Self {
        Self::UnknownSetOperator { op: op.into() }
    }

    pub fn missing_compose(name: impl Into<String>) -> Self {
        Self::MissingCompose { name: name.into() }
    }

    pub fn missing_resource(name: impl Into<String>) -> Self {
        Self::MissingResource { name: name.into() }
    }

    pub fn unknown_clip_type(name: impl Into<String>) -> Self {
        Self::UnknownClipType { name: name.into() }
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn load(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Load {
            name: name.into(),
            message: msg.into(),
        }
    }

    pub fn document(msg: impl Into<String>) -> Self {
        Self::Document {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether this error is a registry lookup failure (missing name of some kind).
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            Self::UnknownSetItem { .. }
                | Self::UnknownSetOperator { .. }
                | Self::MissingCompose { .. }
                | Self::MissingResource { .. }
                | Self::UnknownClipType { .. }
        )
    }
}
