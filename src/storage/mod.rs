//! Storage layer
//!
//! # Architecture
//!
//! The proxy never talks to a server directly. It goes through two traits:
//!
//! ```text
//! DocumentStore ──collection(database, name)──▶ Collection
//!                                                 ├─ insert(doc)
//!                                                 ├─ find(filter)
//!                                                 ├─ update(selector, changes)
//!                                                 ├─ remove(selector)
//!                                                 └─ ensure_index(field)
//! ```
//!
//! ## Implementation
//!
//! [`MemoryStore`] keeps collections in memory and can inject faults; it backs
//! the `replay` command and the tests. Server-backed stores implement the same
//! traits and are addressed by a [`ConnectionString`].

pub mod connection;
pub mod engine;
pub mod memory;

pub use connection::ConnectionString;
pub use engine::{Collection, DocumentStore};
pub use memory::{MemoryCollection, MemoryStore};
