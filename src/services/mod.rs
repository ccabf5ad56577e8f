pub mod backup;
pub mod bookings;
pub mod clock;
pub mod dashboard;
pub mod init;
pub mod notifications;
pub mod reminders;
pub mod telegram;
