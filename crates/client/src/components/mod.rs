pub mod notification_center;
pub mod ui;

pub use notification_center::NotificationCenter;
