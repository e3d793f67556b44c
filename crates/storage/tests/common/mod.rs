pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{memory_store, seeded_bytes};
