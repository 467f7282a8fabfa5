//! Error types for the Trellis core.

use thiserror::Error;

use crate::reactive::Key;
use crate::value::Kind;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while classifying, mutating or serializing
/// a reactive tree.
///
/// Every mutating operation validates its arguments before touching the
/// ownership graph, so an `Err` always leaves the node unchanged.
#[derive(Debug, Error)]
pub enum Error {
    /// The classifier has no converter for this custom value.
    #[error("unsupported value kind: no converter registered for `{type_name}`")]
    UnsupportedValueKind { type_name: &'static str },

    /// The operation needs a different shape of node.
    #[error("expected {expected} node, found {found} node")]
    WrongKind { expected: Kind, found: Kind },

    /// The key cannot be used on this shape of node.
    #[error("key `{key}` is not valid on {kind} nodes")]
    InvalidKey { key: Key, kind: Kind },

    /// Index past the end of a sequence, for operations that need a live slot.
    #[error("index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// The operation would grow a sequence past `SequenceShape::MAX_LEN`.
    #[error("sequence length {requested} exceeds the maximum of {max}")]
    LengthLimit { requested: usize, max: usize },

    /// A `sort_by` comparator panicked, typically because it is not a total
    /// order. The sequence is left unchanged.
    #[error("sort comparator panicked; it must implement a total order")]
    ComparatorPanicked,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MessagePack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_parts() {
        let err = Error::UnsupportedValueKind { type_name: "my::Thing" };
        assert!(err.to_string().contains("my::Thing"));

        let err = Error::InvalidKey { key: Key::Length, kind: Kind::Object };
        assert_eq!(err.to_string(), "key `length` is not valid on object nodes");

        let err = Error::IndexOutOfRange { index: 7, len: 3 };
        assert_eq!(err.to_string(), "index 7 out of range for sequence of length 3");

        let err = Error::LengthLimit { requested: 5, max: 4 };
        assert_eq!(err.to_string(), "sequence length 5 exceeds the maximum of 4");
    }
}
