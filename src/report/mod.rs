//! Durable results and console reporting

pub mod store;
pub mod summary;

pub use store::{ResultsStore, StoreError, COMBINED_FILE};
pub use summary::render_summary;
