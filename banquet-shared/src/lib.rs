pub mod models;
pub mod pii;

pub use models::availability::EventAvailability;
pub use models::booking::{Booking, BookingSource, BookingStatus, ParseStatusError};
pub use models::events::ReservationEvent;
pub use models::hold::{HoldStatus, LockToken, SeatHold};
pub use models::table::{ScheduledEvent, Table, TableState, TableStatus};
pub use pii::Masked;
