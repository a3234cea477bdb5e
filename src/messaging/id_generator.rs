//! Message id generation strategies.

use uuid::Uuid;

/// Produces a unique id for every outgoing message
///
/// Uniqueness is the implementation's responsibility; the cores never check it.
pub trait IdGenerator: Send + Sync + 'static {
    fn create(&self) -> String;
}

/// Time-ordered UUIDv7 ids. The default generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV7Generator;

impl IdGenerator for UuidV7Generator {
    fn create(&self) -> String {
        Uuid::now_v7().to_string()
    }
}

/// Random UUIDv4 ids
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV4Generator;

impl IdGenerator for UuidV4Generator {
    fn create(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_v7_ids_are_unique_and_time_ordered() {
        let generator = UuidV7Generator;
        let ids: Vec<String> = (0..100).map(|_| generator.create()).collect();

        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());

        let parsed = Uuid::parse_str(&ids[0]).unwrap();
        assert_eq!(parsed.get_version_num(), 7);
    }

    #[test]
    fn test_v4_ids_are_non_empty() {
        let id = UuidV4Generator.create();
        assert!(!id.is_empty());
        assert_eq!(Uuid::parse_str(&id).unwrap().get_version_num(), 4);
    }
}
