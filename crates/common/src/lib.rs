//! Common utilities and shared types for civic-desk.
//!
//! This crate provides foundational components used across all civic-desk crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **Clock**: Injectable time source via [`Clock`]
//! - **ID Generation**: Short base-36 identifiers via [`IdGenerator`]
//! - **Collections**: Stable sort, filter and substring search helpers
//! - **Validation**: Rule-based form validation via [`FormValidator`]
//! - **Debounce**: Quiet-period callback throttling via [`Debouncer`]
//! - **Geo**: Coordinates and great-circle distance
//!
//! # Example
//!
//! ```no_run
//! use civic_common::{AppResult, Config, IdGenerator};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Generated ID {id} for {}", config.storage.data_dir.display());
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod collection;
pub mod config;
pub mod debounce;
pub mod error;
pub mod geo;
pub mod id;
pub mod text;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collection::{SortOrder, matches_filter, search_by, sort_by_key};
pub use config::Config;
pub use debounce::Debouncer;
pub use error::{AppError, AppResult};
pub use geo::{Coordinates, haversine_km};
pub use id::IdGenerator;
pub use text::{escape_html, format_count, truncate_text};
pub use validation::{FieldErrors, FieldRule, FormValidator, ValidationResult};
