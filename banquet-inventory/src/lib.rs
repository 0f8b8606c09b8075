pub mod resolver;
pub mod sync;

pub use resolver::{derive_status, TableStatusResolver};
pub use sync::{tally, AvailabilitySynchronizer, SweepReport};
