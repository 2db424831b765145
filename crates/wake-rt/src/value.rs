//! The runtime values the hasher can observe.
//!
//! The evaluator has a richer value universe; the hasher only needs to
//! distinguish data (hashable immediately) from closures (hashable once
//! their frame's hash resolves).

use wake_common::Hash128;

use crate::frame::FrameId;

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Str(String),
    Int(i64),
    /// A closure: the frame it captured plus the structural hash of its
    /// defining expression.
    Closure { frame: FrameId, site: Hash128 },
}

impl Value {
    /// The hash of a data value. Closures have no immediate hash; their
    /// code depends on the captured frame and is computed asynchronously.
    pub fn data_hash(&self) -> Option<Hash128> {
        match self {
            Value::Str(s) => {
                let mut words = Vec::new();
                Hash128::of_bytes(s.as_bytes()).push_words(&mut words);
                Some(Hash128::keyed(1, &words))
            }
            Value::Int(i) => Some(Hash128::keyed(2, &[*i as u64])),
            Value::Closure { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_hashes_are_deterministic_and_tagged() {
        assert_eq!(
            Value::Str("42".into()).data_hash(),
            Value::Str("42".into()).data_hash()
        );
        // A string of digits and the same integer must not collide by tag.
        assert_ne!(
            Value::Str("42".into()).data_hash(),
            Value::Int(42).data_hash()
        );
    }

    #[test]
    fn closures_have_no_immediate_hash() {
        let v = Value::Closure {
            frame: FrameId(0),
            site: Hash128(7),
        };
        assert!(v.data_hash().is_none());
    }
}
