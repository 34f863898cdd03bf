pub mod hub;

pub use hub::{NotificationHub, APPOINTMENT_UPDATED, NEW_APPOINTMENT};
