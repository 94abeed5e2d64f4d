//! Domain services for civic-desk.
//!
//! Services wrap the shared [`civic_db::SharedStore`] and add validation,
//! enrichment, background tasks and document exports on top of the
//! repository traits. [`views`] turns domain state into display models.

pub mod scheduler;
pub mod services;
pub mod views;

pub use scheduler::{PeriodicTask, TaskHandle, spawn_delayed, spawn_periodic};
pub use services::*;
