//! Alerting for litteralert
//!
//! Tier classification, quiet hours and cooldowns, the morning digest, and
//! SMS delivery.

pub mod digest;
pub mod engine;
pub mod messages;
mod notifier;

pub use digest::{DaySummary, Digest, DigestAggregator, LevelStats};
pub use engine::{classify, AlertEngine};
pub use notifier::{
    DeliveryResult, DispatchReport, NotificationError, NotificationSender, SendReceipt,
    SmsGateway, TextbeltClient,
};
