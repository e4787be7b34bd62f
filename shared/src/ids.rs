//! Identifier types and the deterministic "system" agent UUID.
//!
//! The orchestration core treats one UUID as a fixed sentinel representing
//! "not a specific agent" (system-wide metrics, system-level alerts). Free
//! form agent identifiers that are not valid UUIDs (e.g. the literal string
//! `"system"`, or a human-readable worker name) are mapped deterministically
//! to UUIDv5 values so that the same input always produces the same output
//! across process restarts. This logic must stay centralized here — see
//! Design Notes on `ensure_uuid` in SPEC_FULL.md.

use once_cell::sync::Lazy;
use std::str::FromStr;
use uuid::Uuid;

pub type AgentId = Uuid;
pub type TaskId = Uuid;
pub type SubtaskId = String;

/// Fixed DNS namespace used for all deterministic v5 derivations in this crate.
pub const ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0xa7, 0xb8, 0x10, 0x9d, 0xad, 0x11, 0xd1, 0x80, 0xb4, 0x00, 0xc0, 0x4f, 0xd4, 0x30, 0xc8,
]);

/// The fixed, deterministic UUID substituted for the "system" sentinel agent.
/// Constant for the process lifetime (and across processes, since it is
/// derived once from a fixed namespace + name).
pub static SYSTEM_AGENT_ID: Lazy<Uuid> = Lazy::new(|| Uuid::new_v5(&ID_NAMESPACE, b"system"));

/// Convert a free-form agent identifier string to a UUID.
///
/// - `"system"` maps to [`SYSTEM_AGENT_ID`].
/// - A string that already parses as a UUID is returned unchanged.
/// - Anything else is deterministically hashed into a UUIDv5 under
///   [`ID_NAMESPACE`].
pub fn ensure_uuid(agent_id: &str) -> Uuid {
    if agent_id == "system" {
        return *SYSTEM_AGENT_ID;
    }
    if let Ok(parsed) = Uuid::from_str(agent_id) {
        return parsed;
    }
    Uuid::new_v5(&ID_NAMESPACE, agent_id.as_bytes())
}
