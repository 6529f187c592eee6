//! Unique identifiers for Gantry entities.
//!
//! Each identifier type wraps a [`uuid::Uuid`] behind a distinct newtype,
//! providing compile-time safety against mixing different ID kinds.
//!
//! All ID types are `Copy` (16 bytes, stack-allocated) and support:
//! - `v4()` for random UUID generation
//! - `nil()` for the zero-valued default
//! - `parse(&str)` for string parsing
//! - Full serde support (serializes as a UUID string)
//! - `Display`, `FromStr`, `Eq`, `Ord`, `Hash`

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random (v4) identifier.
            #[must_use]
            pub fn v4() -> Self {
                Self(Uuid::new_v4())
            }

            /// The zero-valued identifier.
            #[must_use]
            pub fn nil() -> Self {
                Self(Uuid::nil())
            }

            /// Returns `true` if this is the zero-valued identifier.
            #[must_use]
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            /// Parse an identifier from its canonical string form.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// The underlying UUID.
            #[must_use]
            pub fn get(&self) -> Uuid {
                self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

define_id!(
    /// Identifies a tenant. Every persisted record is scoped by one.
    TenantId
);
define_id!(
    /// Identifies a workflow definition.
    WorkflowId
);
define_id!(
    /// Identifies a single run of a workflow.
    ExecutionId
);
define_id!(
    /// Identifies an external trigger; used for trigger deduplication.
    TriggerId
);
define_id!(
    /// Identifies a domain event in the event store.
    EventId
);
define_id!(
    /// Identifies a job on the work queue.
    JobId
);
define_id!(
    /// Identifies a scheduled event.
    ScheduleId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4_creates_non_nil() {
        assert!(!ExecutionId::v4().is_nil());
        assert!(!TenantId::v4().is_nil());
        assert!(!WorkflowId::v4().is_nil());
        assert!(!TriggerId::v4().is_nil());
        assert!(!EventId::v4().is_nil());
        assert!(!JobId::v4().is_nil());
        assert!(!ScheduleId::v4().is_nil());
    }

    #[test]
    fn nil_is_zero_valued() {
        let id = ExecutionId::nil();
        assert!(id.is_nil());
        assert_eq!(id.to_string(), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn parse_valid_uuid_string() {
        let id = WorkflowId::parse("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert!(!id.is_nil());
        assert_eq!(id.to_string(), "550e8400-e29b-41d4-a716-446655440000");
    }

    #[test]
    fn parse_invalid_string_fails() {
        assert!(WorkflowId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn copy_semantics() {
        let a = TenantId::v4();
        let b = a;
        assert_eq!(a, b);
    }

    #[test]
    fn serde_roundtrip_as_string() {
        let id = ExecutionId::v4();
        let json = serde_json::to_string(&id).unwrap();
        assert!(json.starts_with('"'));
        let back: ExecutionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn from_uuid_roundtrips() {
        let raw = Uuid::new_v4();
        let typed = JobId::from(raw);
        assert_eq!(typed.get(), raw);
    }

    #[test]
    fn different_id_types_are_incompatible() {
        // ExecutionId and WorkflowId are distinct types — passing one where
        // the other is expected would be a compile error.
        fn accepts_execution(_id: ExecutionId) {}
        fn accepts_workflow(_id: WorkflowId) {}

        accepts_execution(ExecutionId::v4());
        accepts_workflow(WorkflowId::v4());
        // accepts_execution(WorkflowId::v4()); // Would not compile
    }

    #[test]
    fn ordering_and_hash_are_consistent() {
        use std::collections::HashSet;

        let a = EventId::nil();
        let b = EventId::parse("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert!(a < b);

        let mut set = HashSet::new();
        set.insert(b);
        assert!(set.contains(&b));
    }
}
