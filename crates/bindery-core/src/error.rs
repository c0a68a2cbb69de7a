//! Error types for bindery.

/// A specialized Result type for binding operations.
pub type Result<T> = std::result::Result<T, BindError>;

/// Errors raised by container operations on bindable collections.
///
/// These mirror the failures of the underlying standard containers. The binding
/// layer never wraps them further, and no change event is emitted for an
/// operation that fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    /// Dequeue, pop or peek on an empty container.
    #[error("Container is empty")]
    Empty,

    /// An index was outside the valid range of a list.
    #[error("Index {index} is out of range for length {len}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The length of the list at the time of the call.
        len: usize,
    },

    /// A dictionary already holds an entry for the key being added.
    #[error("An entry with the same key already exists")]
    DuplicateKey,

    /// A dictionary holds no entry for the requested key.
    #[error("The given key was not present in the dictionary")]
    KeyNotFound,
}

impl BindError {
    /// Create an out-of-range error.
    pub fn out_of_range(index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { index, len }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(BindError::Empty.to_string(), "Container is empty");
        assert_eq!(
            BindError::out_of_range(5, 2).to_string(),
            "Index 5 is out of range for length 2"
        );
        assert_eq!(
            BindError::DuplicateKey.to_string(),
            "An entry with the same key already exists"
        );
    }
}
