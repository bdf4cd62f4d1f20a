pub mod bookings;
pub mod crypto;
pub mod state;
pub mod tax;
