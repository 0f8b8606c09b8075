mod availability_repo;
mod booking_repo;
mod hold_repo;
mod rows;
mod table_repo;

pub use availability_repo::PgAvailabilityRepository;
pub use booking_repo::PgBookingRepository;
pub use hold_repo::PgHoldRepository;
pub use table_repo::PgTableRepository;

use banquet_core::repository::StoreError;

pub(crate) const ACTIVE_HOLD_CONSTRAINT: &str = "seat_holds_one_active";
pub(crate) const HOLD_TOKEN_CONSTRAINT: &str = "seat_holds_lock_token_key";
pub(crate) const OCCUPYING_BOOKING_CONSTRAINT: &str = "bookings_one_occupying";
pub(crate) const BOOKING_HOLD_CONSTRAINT: &str = "bookings_hold_id_key";

/// Name of the unique constraint `err` violated, if that is what it is.
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => db.constraint(),
        _ => None,
    }
}

pub(crate) fn db_error(err: sqlx::Error) -> StoreError {
    StoreError::Database(err.to_string())
}
