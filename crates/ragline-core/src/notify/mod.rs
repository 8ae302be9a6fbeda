//! User-visible status notifications.

pub mod bus;

pub use bus::NotificationBus;
