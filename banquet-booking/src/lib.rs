pub mod holds;
pub mod lifecycle;
pub mod token;

pub use holds::{HoldPolicy, SeatHoldManager};
pub use lifecycle::{BookingLifecycle, DirectBooking, OpenBooking};
pub use token::generate_lock_token;
