//! Logging facilities for bindery.
//!
//! bindery uses the `tracing` crate for instrumentation and never installs a
//! subscriber itself. To see logs, install one in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("bindery_core::rate_limit=debug")
//!         .init();
//! }
//! ```
//!
//! Every event is emitted with an explicit target from [`targets`], so each
//! subsystem can be filtered independently.

/// Span names used throughout bindery for tracing.
pub mod span_names {
    /// Listener fan-out span.
    pub const NOTIFY: &str = "bindery::notify";
    /// Delayed throttle/debounce fire span.
    pub const RATE_LIMIT_FIRE: &str = "bindery::rate_limit::fire";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Listener registry and fan-out.
    pub const LISTENER: &str = "bindery_core::listener";
    /// Fine-grained change event channel.
    pub const SIGNAL: &str = "bindery_core::signal";
    /// Scalar bindable model.
    pub const MODEL: &str = "bindery_core::model";
    /// Bindable collections.
    pub const COLLECTION: &str = "bindery_core::collections";
    /// Throttle and debounce controllers.
    pub const RATE_LIMIT: &str = "bindery_core::rate_limit";
    /// Background scheduling runtime.
    pub const RUNTIME: &str = "bindery_core::runtime";
    /// Service locator.
    pub const LOCATOR: &str = "bindery_core::locator";
}
