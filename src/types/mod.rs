//! Core data types shared across the harvester.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Record`] | One harvested row, an opaque JSON object |
//! | [`IdField`] | Primary (account) vs secondary (display name) identifier family |
//! | [`TargetIdentity`] | Caller-supplied identity to resolve against records |

pub mod record;
pub mod target;

pub use record::{IdField, Record, PRIMARY_ID_FIELDS, SECONDARY_ID_FIELDS};
pub use target::TargetIdentity;
