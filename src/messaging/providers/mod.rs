//! Messaging backend providers bundled with the core.

pub mod in_memory;

pub use in_memory::InMemoryBroker;
