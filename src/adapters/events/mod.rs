//! Event bookkeeping adapters.
//!
//! - `InMemoryProcessedEventStore` - Bounded duplicate-delivery guard

mod in_memory_processed_store;

pub use in_memory_processed_store::InMemoryProcessedEventStore;
