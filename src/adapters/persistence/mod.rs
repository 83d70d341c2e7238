//! Persistence Adapters - In-memory Store with File Durability
//!
//! `MemoryTradeStore` implements the `TradeStore` port. It can be imaged
//! to an atomic JSON state file between restarts, and audit records go to
//! append-only daily JSONL files. No database dependency.

pub mod audit_log;
pub mod memory_store;
pub mod state;

pub use audit_log::{JsonlAuditLog, MemoryAuditSink};
pub use memory_store::{MemoryTradeStore, StoreImage};
pub use state::StateFile;
