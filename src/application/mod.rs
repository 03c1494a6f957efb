//! Application layer: view models over the query cache and the context that
//! wires them together.

pub mod context;
pub mod devtools;
pub mod error;
pub mod people;
pub mod posts;
