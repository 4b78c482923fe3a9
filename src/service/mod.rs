//! Service layer: message intake and the process-wide notification
//! listener.

pub mod message_service;
pub mod notification_listener;

pub use message_service::{Delivery, DeliveryStatus, MessageService, Submission};
pub use notification_listener::{NotificationListener, RetryPolicy};
