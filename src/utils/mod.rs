mod hash;

pub use hash::compute_digest;

/// Current sylva version, recorded in stored snapshots
pub const SYLVA_VERSION: &str = "0.1.0";

/// Schema version of the snapshot file format
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Get current timestamp in ISO 8601 format
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}
