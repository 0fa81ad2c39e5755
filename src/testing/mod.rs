//! Testing utilities.
//!
//! In-memory record repository and storage for exercising a full prune run
//! without Postgres or a real upload directory.

mod mock;

pub use mock::{InMemoryRecordRepository, InMemoryStorage, MockCall};
