use thiserror::Error;

/// Everything that can abort a load. None of these leave a partial scene
/// behind, and nothing is retried internally.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("malformed JSON: {0}")]
    Json(String),
    #[error("glTF version {0} not supported")]
    UnsupportedVersion(String),
    #[error("invalid glTF file: {object} is missing the required field \"{field}\"")]
    MissingRequiredField { object: String, field: &'static str },
    #[error("invalid glTF file: {object} has an invalid \"{field}\" value")]
    InvalidField { object: String, field: &'static str },
    #[error("invalid glTF file: {object} refers to {kind} {index}, but there are only {len}")]
    InvalidReference {
        object: String,
        kind: &'static str,
        index: usize,
        len: usize,
    },
    #[error("invalid glTF file: {object} needs {required} bytes, but only {available} are available")]
    OutOfBounds {
        object: String,
        required: usize,
        available: usize,
    },
    #[error("invalid glTF file: node {0} is its own ancestor")]
    CyclicNodeReference(usize),
    #[error("invalid glTF file: node {0} is attached to more than one parent")]
    MultipleParents(usize),
    #[error("{0} is not supported")]
    Unsupported(String),
    #[error("could not fetch buffer \"{uri}\"")]
    BufferFetch {
        uri: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("invalid GLB container: {0}")]
    Glb(&'static str),
}

impl LoadError {
    pub(crate) fn missing(object: impl Into<String>, field: &'static str) -> LoadError {
        LoadError::MissingRequiredField {
            object: object.into(),
            field,
        }
    }

    pub(crate) fn invalid(object: impl Into<String>, field: &'static str) -> LoadError {
        LoadError::InvalidField {
            object: object.into(),
            field,
        }
    }
}

/// Looks up `index` in `items`, or fails with [`LoadError::InvalidReference`].
pub(crate) fn resolve<'a, T>(
    items: &'a [T],
    index: usize,
    kind: &'static str,
    object: impl FnOnce() -> String,
) -> Result<&'a T, LoadError> {
    items.get(index).ok_or_else(|| LoadError::InvalidReference {
        object: object(),
        kind,
        index,
        len: items.len(),
    })
}
