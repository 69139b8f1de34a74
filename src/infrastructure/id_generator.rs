// Unique ID Generator - object IDs with the object type embedded
// ID format: "1" + [type number: 3 digits] + [sequence: 13 digits]

use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::object_type::ObjectType;
use crate::error::{AppError, AppResult};

/// Largest sequence that still fits the 13 digit field
const MAX_SEQUENCE: u64 = 9_999_999_999_999;

/// Hands out object IDs that the object type resolver can classify.
/// The sequence is shared across object types and never repeats within a process.
#[derive(Debug)]
pub struct UniqueIdGenerator {
    sequence: AtomicU64,
}

impl UniqueIdGenerator {
    /// Create a generator whose first ID uses sequence `start`
    pub fn new(start: u64) -> Self {
        Self {
            sequence: AtomicU64::new(start.max(1)),
        }
    }

    /// Generate the next ID for the given object type
    pub fn gen_unique_id_str(&self, object_type: ObjectType) -> AppResult<String> {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        if seq > MAX_SEQUENCE {
            return Err(AppError::Internal(format!(
                "unique id sequence exhausted at {}",
                seq
            )));
        }
        Ok(format_object_id(object_type, seq))
    }

    /// Sequence the next call will use
    pub fn peek_sequence(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

impl Default for UniqueIdGenerator {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Render an object ID from its parts
pub fn format_object_id(object_type: ObjectType, seq: u64) -> String {
    format!("1{:03}{:013}", object_type.type_number(), seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generation() {
        let generator = UniqueIdGenerator::new(42);

        let id1 = generator.gen_unique_id_str(ObjectType::Question).unwrap();
        let id2 = generator.gen_unique_id_str(ObjectType::Question).unwrap();
        let id3 = generator.gen_unique_id_str(ObjectType::Tag).unwrap();

        assert_eq!(id1, "10010000000000042");
        assert_eq!(id2, "10010000000000043");
        assert_eq!(id3, "10030000000000044");
        assert_eq!(generator.peek_sequence(), 45);
    }

    #[test]
    fn test_generated_ids_classify_back() {
        let generator = UniqueIdGenerator::default();
        for object_type in ObjectType::ALL {
            let id = generator.gen_unique_id_str(object_type).unwrap();
            assert_eq!(ObjectType::from_object_id(&id).unwrap(), object_type);
        }
    }

    #[test]
    fn test_sequence_exhaustion() {
        let generator = UniqueIdGenerator::new(MAX_SEQUENCE);
        assert!(generator.gen_unique_id_str(ObjectType::User).is_ok());
        assert!(matches!(
            generator.gen_unique_id_str(ObjectType::User),
            Err(AppError::Internal(_))
        ));
    }
}
