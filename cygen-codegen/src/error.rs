// Error types for the generation pipelines.

use thiserror::Error;

/// Failures surfaced while generating one artifact. A failure aborts that
/// artifact; the generator never retries.
#[derive(Debug, Error)]
pub enum GenError {
    /// The type service cannot render or convert a semantic type.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// A class name was referenced where a registered class is required
    /// (parent lists, constructor qualification).
    #[error("unknown class: {0}")]
    UnknownClass(String),

    /// A description is missing a required piece or is internally inconsistent.
    #[error("invalid description for `{item}`: {reason}")]
    InvalidDescription { item: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse environment JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Convenience alias used throughout the generator.
pub type GenResult<T> = Result<T, GenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_are_human_readable() {
        let err = GenError::UnknownType("quaternion".into());
        assert_eq!(err.to_string(), "unknown type: quaternion");

        let err = GenError::InvalidDescription {
            item: "Shape".into(),
            reason: "duplicate signature key".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid description for `Shape`: duplicate signature key"
        );
    }
}
