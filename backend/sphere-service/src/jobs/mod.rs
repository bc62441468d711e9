/// Background jobs
///
/// - integrity_repair: detects and repairs half-applied cross-document writes
pub mod integrity_repair;

pub use integrity_repair::{run_repair_cycle, start_integrity_repair, RepairReport};
