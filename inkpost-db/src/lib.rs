pub mod client;
pub mod memory;
pub mod postgres;
mod record;

pub use client::{DbError, Store};
pub use memory::MemoryStore;
pub use postgres::PgStore;
