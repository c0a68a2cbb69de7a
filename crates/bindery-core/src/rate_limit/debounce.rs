//! Trailing-edge debouncing.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::Instant;

use super::{ControllerState, NotificationController, NotifyAction, RateLimitKind};
use crate::logging::{span_names, targets};
use crate::runtime::AsyncCancellationToken;

/// Notifies once the value has stopped changing for a full cool-down.
///
/// Every change pushes the deadline to `now + cool_down`. A single waiter task
/// per burst sleeps until the deadline, re-checks it, and fires once it has
/// actually passed.
pub struct Debounce {
    shared: Arc<DebounceShared>,
    runtime: Handle,
}

struct DebounceShared {
    cool_down: Mutex<Duration>,
    /// `Some` while a notification is pending.
    deadline: Mutex<Option<Instant>>,
    token: AsyncCancellationToken,
    action: NotifyAction,
}

enum Settle {
    Wait(Instant),
    Fire,
    Abandon,
}

impl DebounceShared {
    /// Decide what the waiter does next, clearing the deadline when it fires.
    fn settle(&self) -> Settle {
        if self.token.is_cancelled() {
            return Settle::Abandon;
        }
        let mut deadline = self.deadline.lock();
        match *deadline {
            None => Settle::Abandon,
            Some(at) if at > Instant::now() => Settle::Wait(at),
            Some(_) => {
                *deadline = None;
                Settle::Fire
            }
        }
    }

    async fn wait(self: Arc<Self>) {
        loop {
            match self.settle() {
                Settle::Abandon => return,
                Settle::Fire => break,
                Settle::Wait(at) => {
                    tokio::select! {
                        _ = self.token.cancelled() => {
                            tracing::debug!(target: targets::RATE_LIMIT, "debounce cancelled");
                            return;
                        }
                        _ = tokio::time::sleep_until(at) => {}
                    }
                }
            }
        }

        let _span = tracing::trace_span!(target: targets::RATE_LIMIT, span_names::RATE_LIMIT_FIRE, kind = "debounce").entered();
        (self.action)();
    }
}

impl Debounce {
    /// Create a debounce that runs `action` on `runtime`.
    pub fn new(cool_down: Duration, runtime: Handle, action: NotifyAction) -> Self {
        tracing::debug!(target: targets::RATE_LIMIT, ?cool_down, "debounce opened");
        Self {
            shared: Arc::new(DebounceShared {
                cool_down: Mutex::new(cool_down),
                deadline: Mutex::new(None),
                token: AsyncCancellationToken::new(),
                action,
            }),
            runtime,
        }
    }

    /// Time left until the pending notification fires, if one is pending.
    pub fn remaining(&self) -> Option<Duration> {
        self.shared
            .deadline
            .lock()
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Whether [`cancel`](NotificationController::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.shared.token.is_cancelled()
    }
}

impl NotificationController for Debounce {
    fn kind(&self) -> RateLimitKind {
        RateLimitKind::Debounce
    }

    fn on_value_changed(&self) {
        if self.shared.token.is_cancelled() {
            return;
        }
        let start_waiter = {
            let mut deadline = self.shared.deadline.lock();
            let idle = deadline.is_none();
            *deadline = Some(Instant::now() + *self.shared.cool_down.lock());
            idle
        };

        if start_waiter {
            self.runtime.spawn(Arc::clone(&self.shared).wait());
        } else {
            tracing::trace!(target: targets::RATE_LIMIT, "debounce deadline reset");
        }
    }

    fn cool_down(&self) -> Duration {
        *self.shared.cool_down.lock()
    }

    fn set_cool_down(&self, cool_down: Duration) {
        *self.shared.cool_down.lock() = cool_down;
    }

    fn state(&self) -> ControllerState {
        if self.shared.deadline.lock().is_some() {
            ControllerState::Pending
        } else {
            ControllerState::Idle
        }
    }

    fn cancel(&self) {
        if !self.shared.token.is_cancelled() {
            tracing::debug!(target: targets::RATE_LIMIT, "debounce closed");
        }
        self.shared.token.cancel();
        *self.shared.deadline.lock() = None;
    }
}

impl Drop for Debounce {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Debounce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debounce")
            .field("cool_down", &self.cool_down())
            .field("remaining", &self.remaining())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
