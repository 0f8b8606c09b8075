pub mod availability;
pub mod booking;
pub mod events;
pub mod hold;
pub mod table;
