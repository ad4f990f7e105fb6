//! Data models for litteralert

mod alert;
mod entry;
mod reading;

pub use alert::*;
pub use entry::*;
pub use reading::*;
