//! Scan/finding persistence contracts.
//!
//! The core only requires key uniqueness per `(tenant_id, id)` and a
//! secondary lookup by correlation ID; the backing technology is a
//! repository-collaborator concern (Table Storage is one option). An
//! in-memory backend ships for tests and the demo binary.

mod memory;
mod store;

pub use memory::InMemoryRepository;
pub use store::DriftRepository;
