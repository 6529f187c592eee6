#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Gantry Core
//!
//! Core types for the Gantry workflow engine. This crate provides the
//! fundamental building blocks used by all other Gantry crates:
//!
//! - **Identifiers**: [`TenantId`], [`WorkflowId`], [`ExecutionId`],
//!   [`TriggerId`], [`EventId`], [`JobId`], [`ScheduleId`] — typed UUID
//!   wrappers that cannot be mixed up at compile time.
//! - **Node keys**: [`NodeKey`] — validated, author-assigned string
//!   identifiers, unique within a workflow.

pub mod id;
pub mod key;

pub use id::{EventId, ExecutionId, JobId, ScheduleId, TenantId, TriggerId, WorkflowId};
pub use key::{NodeKey, NodeKeyError};

/// Serde helper for `Option<Duration>` serialized as milliseconds.
pub mod serde_duration_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    /// Serialize an `Option<Duration>` as an optional integer of milliseconds.
    pub fn serialize<S: Serializer>(duration: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match duration {
            Some(d) => (d.as_millis() as u64).serialize(s),
            None => s.serialize_none(),
        }
    }

    /// Deserialize an optional integer of milliseconds into `Option<Duration>`.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let opt: Option<u64> = Option::deserialize(d)?;
        Ok(opt.map(Duration::from_millis))
    }
}

/// Serde helper for `Duration` serialized as milliseconds.
pub mod serde_duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    /// Serialize a `Duration` as an integer of milliseconds.
    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (duration.as_millis() as u64).serialize(s)
    }

    /// Deserialize an integer of milliseconds into a `Duration`.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}
