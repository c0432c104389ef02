use thiserror::Error;

/// Errors raised at the encode/decode boundary of the keyspace.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyspaceError {
    #[error("Invalid {entity_type}: {field} must not be empty")]
    InvalidEntity {
        entity_type: &'static str,
        field: &'static str,
    },
    #[error("Unrecognized key pattern: ({pk}, {sk})")]
    UnrecognizedKeyPattern { pk: String, sk: String },
    #[error("Unrecognized index key: {0}")]
    UnrecognizedIndexKey(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_entity_display() {
        let error = KeyspaceError::InvalidEntity {
            entity_type: "Progress",
            field: "course_id",
        };
        assert_eq!(
            error.to_string(),
            "Invalid Progress: course_id must not be empty"
        );
    }

    #[test]
    fn test_unrecognized_key_pattern_display() {
        let error = KeyspaceError::UnrecognizedKeyPattern {
            pk: "ORDER#1".to_string(),
            sk: "ITEM#2".to_string(),
        };
        assert_eq!(error.to_string(), "Unrecognized key pattern: (ORDER#1, ITEM#2)");
    }
}
