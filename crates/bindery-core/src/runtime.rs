//! Background scheduling runtime for delayed notifications.
//!
//! Throttled and debounced models wait on timers. Those waits run as tokio
//! tasks so the thread that changed the value never blocks. This module owns
//! the runtime those tasks run on and the cancellation token used to stop them.
//!
//! # Choosing a Runtime
//!
//! A model resolves its runtime in this order:
//!
//! 1. A handle passed explicitly with [`BindModel::with_runtime`](crate::BindModel::with_runtime).
//! 2. The tokio runtime the caller is currently running on, if any.
//! 3. The lazily created global runtime, see [`AsyncRuntime::global`].
//!
//! # Example
//!
//! ```no_run
//! use bindery_core::runtime::{AsyncRuntime, AsyncRuntimeConfig};
//!
//! // Configure the global runtime before the first throttled model is used.
//! AsyncRuntime::init_global(
//!     AsyncRuntimeConfig::multi_threaded()
//!         .with_worker_threads(2)
//!         .with_thread_name("inventory-timers"),
//! )?;
//! # Ok::<(), bindery_core::runtime::AsyncRuntimeError>(())
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};

use crate::logging::targets;

/// Global async runtime instance.
static GLOBAL_RUNTIME: OnceLock<AsyncRuntime> = OnceLock::new();

/// The type of async runtime to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeType {
    /// Multi-threaded runtime using Tokio's default scheduler.
    #[default]
    MultiThreaded,

    /// Single-threaded runtime on a dedicated thread.
    ///
    /// All timers run on one thread, so delayed notifications are delivered
    /// in the order their timers expire.
    SingleThreaded,
}

/// Configuration for the async runtime.
#[derive(Debug, Clone)]
pub struct AsyncRuntimeConfig {
    /// The type of runtime to create.
    pub runtime_type: RuntimeType,
    /// Number of worker threads for multi-threaded runtime.
    /// Defaults to the number of CPU cores.
    pub worker_threads: Option<usize>,
    /// Name prefix for runtime threads.
    pub thread_name: String,
    /// Enable time driver (required for throttle and debounce).
    pub enable_time: bool,
}

impl Default for AsyncRuntimeConfig {
    fn default() -> Self {
        Self {
            runtime_type: RuntimeType::MultiThreaded,
            worker_threads: None,
            thread_name: "bindery-timers".to_string(),
            enable_time: true,
        }
    }
}

impl AsyncRuntimeConfig {
    /// Create a configuration for a multi-threaded runtime.
    pub fn multi_threaded() -> Self {
        Self {
            runtime_type: RuntimeType::MultiThreaded,
            ..Default::default()
        }
    }

    /// Create a configuration for a single-threaded runtime.
    pub fn single_threaded() -> Self {
        Self {
            runtime_type: RuntimeType::SingleThreaded,
            ..Default::default()
        }
    }

    /// Set the number of worker threads (multi-threaded runtime only).
    pub fn with_worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = Some(count);
        self
    }

    /// Set the thread name prefix.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// Errors from creating or installing a runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AsyncRuntimeError {
    /// The global runtime was already initialized.
    #[error("Global async runtime is already initialized")]
    AlreadyInitialized,
    /// Tokio failed to build the runtime.
    #[error("Failed to create async runtime: {0}")]
    CreationFailed(String),
}

/// A cancellation token for async tasks.
///
/// Cloned tokens share state. Cancelling is idempotent and wakes every task
/// awaiting [`cancelled`](Self::cancelled).
#[derive(Debug, Clone)]
pub struct AsyncCancellationToken {
    inner: Arc<AsyncCancellationState>,
}

#[derive(Debug)]
struct AsyncCancellationState {
    cancelled: AtomicBool,
    notify: tokio::sync::Notify,
}

impl AsyncCancellationToken {
    /// Create a new cancellation token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AsyncCancellationState {
                cancelled: AtomicBool::new(false),
                notify: tokio::sync::Notify::new(),
            }),
        }
    }

    /// Check if cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Request cancellation.
    ///
    /// This sets the cancellation flag and notifies any waiters.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Wait asynchronously until cancellation is requested.
    ///
    /// Returns immediately if already cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
            if self.is_cancelled() {
                return;
            }
        }
    }
}

impl Default for AsyncCancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Runtime thread of a single-threaded [`AsyncRuntime`].
struct TimerThread {
    join: Mutex<Option<JoinHandle<()>>>,
    stop: tokio::sync::oneshot::Sender<()>,
}

/// An owned tokio runtime that delayed notifications can be scheduled on.
///
/// Models only ever hold its [`Handle`]; timers are spawned through the
/// handle, so dropping or shutting down the runtime silently discards any
/// window that is still pending.
pub struct AsyncRuntime {
    /// `Some` for the multi-threaded flavour.
    runtime: Option<Runtime>,
    handle: Handle,
    /// `Some` for the single-threaded flavour.
    timer_thread: Option<TimerThread>,
    runtime_type: RuntimeType,
}

impl AsyncRuntime {
    /// The process-wide runtime used by models that have no other runtime.
    ///
    /// Created on first use from [`AsyncRuntimeConfig::default`] unless
    /// [`init_global`](Self::init_global) ran first.
    ///
    /// # Panics
    ///
    /// Panics if tokio cannot create the runtime on first use.
    pub fn global() -> &'static AsyncRuntime {
        GLOBAL_RUNTIME.get_or_init(|| {
            AsyncRuntime::new(AsyncRuntimeConfig::default())
                .expect("Failed to create global async runtime")
        })
    }

    /// Install the global runtime with a custom configuration.
    ///
    /// Fails with [`AsyncRuntimeError::AlreadyInitialized`] once any model has
    /// fallen back to the global runtime or a previous call succeeded.
    pub fn init_global(config: AsyncRuntimeConfig) -> Result<&'static AsyncRuntime, AsyncRuntimeError> {
        GLOBAL_RUNTIME
            .set(AsyncRuntime::new(config)?)
            .map_err(|_| AsyncRuntimeError::AlreadyInitialized)?;
        Ok(Self::global())
    }

    /// Build a runtime from `config`.
    pub fn new(config: AsyncRuntimeConfig) -> Result<Self, AsyncRuntimeError> {
        tracing::debug!(target: targets::RUNTIME, ?config, "creating async runtime");
        match config.runtime_type {
            RuntimeType::MultiThreaded => Self::build_multi_threaded(&config),
            RuntimeType::SingleThreaded => Self::build_single_threaded(&config),
        }
    }

    fn build_multi_threaded(config: &AsyncRuntimeConfig) -> Result<Self, AsyncRuntimeError> {
        let mut builder = Builder::new_multi_thread();
        builder.thread_name(&config.thread_name);
        if let Some(workers) = config.worker_threads {
            builder.worker_threads(workers);
        }
        if config.enable_time {
            builder.enable_time();
        }
        let runtime = builder
            .build()
            .map_err(|e| AsyncRuntimeError::CreationFailed(e.to_string()))?;

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            timer_thread: None,
            runtime_type: RuntimeType::MultiThreaded,
        })
    }

    fn build_single_threaded(config: &AsyncRuntimeConfig) -> Result<Self, AsyncRuntimeError> {
        let enable_time = config.enable_time;
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();

        let join = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                let mut builder = Builder::new_current_thread();
                if enable_time {
                    builder.enable_time();
                }
                match builder.build() {
                    Ok(runtime) => {
                        let _ = ready_tx.send(Ok(runtime.handle().clone()));
                        runtime.block_on(async {
                            let _ = stopped.await;
                        });
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                    }
                }
            })
            .map_err(|e| AsyncRuntimeError::CreationFailed(e.to_string()))?;

        let handle = ready_rx
            .recv()
            .map_err(|e| AsyncRuntimeError::CreationFailed(e.to_string()))?
            .map_err(AsyncRuntimeError::CreationFailed)?;

        Ok(Self {
            runtime: None,
            handle,
            timer_thread: Some(TimerThread {
                join: Mutex::new(Some(join)),
                stop,
            }),
            runtime_type: RuntimeType::SingleThreaded,
        })
    }

    /// Which flavour this runtime was built as.
    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }

    /// Handle to pass to [`BindModel::with_runtime`](crate::BindModel::with_runtime).
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Stop the runtime.
    ///
    /// Pending timers are dropped without firing.
    pub fn shutdown(mut self) {
        tracing::debug!(target: targets::RUNTIME, runtime_type = ?self.runtime_type, "shutting down async runtime");
        if let Some(thread) = self.timer_thread.take() {
            let _ = thread.stop.send(());
            if let Some(join) = thread.join.lock().take() {
                let _ = join.join();
            }
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for AsyncRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncRuntime")
            .field("runtime_type", &self.runtime_type)
            .finish_non_exhaustive()
    }
}

/// Resolve the runtime handle timers should be spawned on.
pub(crate) fn resolve_handle(explicit: Option<&Handle>) -> Handle {
    if let Some(handle) = explicit {
        return handle.clone();
    }
    Handle::try_current().unwrap_or_else(|_| AsyncRuntime::global().handle().clone())
}
