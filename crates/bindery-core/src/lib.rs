//! Reactive data bindings.
//!
//! This crate provides observable values and containers that notify registered
//! listeners when they change:
//!
//! - **Listeners**: identity-keyed callback sets with isolated fan-out
//! - **Models**: scalar values with equality-gated change notification
//! - **Collections**: list, dictionary, queue and stack wrappers that report
//!   every operation as a typed change event
//! - **Rate limiting**: throttle and debounce controllers that coalesce rapid
//!   changes to a model
//! - **Service locator**: a typed registry of shared instances
//!
//! # Model Example
//!
//! ```
//! use bindery_core::{BindModel, Bindable, Listener};
//!
//! let score = BindModel::new(0);
//!
//! // Called once now with 0, then on every distinct change.
//! let label = Listener::new(|value: &i32| println!("Score: {}", value));
//! score.add_listener_with_init(&label);
//!
//! score.set_value(10);
//! score.set_value(10); // unchanged, no notification
//!
//! score.try_remove_listener(&label);
//! ```
//!
//! # Collection Example
//!
//! ```
//! use bindery_core::{BindQueue, BindError, ChangeKind};
//!
//! let jobs = BindQueue::new();
//! jobs.subscribe(|event| {
//!     if event.kind == ChangeKind::Removed {
//!         println!("Started job {}", event.item);
//!     }
//! });
//!
//! jobs.enqueue("build");
//! assert_eq!(jobs.dequeue(), Ok("build"));
//! assert_eq!(jobs.dequeue(), Err(BindError::Empty));
//! ```
//!
//! # Rate Limiting Example
//!
//! ```
//! use bindery_core::{BindModel, Bindable};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let search = BindModel::new(String::new());
//! search.add_listener(|query| println!("Searching for {query}"));
//!
//! // Only search once typing has paused for 300ms.
//! search.open_debounce(Duration::from_millis(300));
//! for query in ["r", "ru", "rus", "rust"] {
//!     search.set_value(query.to_string());
//! }
//! tokio::time::sleep(Duration::from_millis(400)).await;
//! # }
//! ```

pub mod bindable;
pub mod collections;
mod error;
pub mod listener;
mod locator;
pub mod logging;
pub mod model;
pub mod rate_limit;
pub mod runtime;
pub mod signal;

pub use bindable::{Bindable, ChangeEvent, ChangeKind, EntryChangeEvent};
pub use collections::{BindDictionary, BindList, BindQueue, BindStack};
pub use error::{BindError, Result};
pub use listener::{FanOut, Listener, ListenerId, ListenerRegistry};
pub use locator::ServiceLocator;
pub use model::BindModel;
pub use rate_limit::{
    ControllerState, Debounce, NotificationController, RateLimit, RateLimitKind, Throttle,
};
pub use runtime::{
    AsyncCancellationToken, AsyncRuntime, AsyncRuntimeConfig, AsyncRuntimeError, RuntimeType,
};
pub use signal::{ConnectionId, Signal};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        BindDictionary, BindList, BindModel, BindQueue, BindStack, Bindable, ChangeEvent,
        ChangeKind, EntryChangeEvent, Listener, RateLimit, ServiceLocator,
    };
}
