//! Observable containers.
//!
//! Each container wraps a standard collection and reports changes two ways:
//!
//! - **Coarse**: the [`Bindable`](crate::Bindable) listeners, notified with a
//!   copy of the whole collection when it is replaced through `set_value`.
//! - **Fine-grained**: a [`Signal`](crate::Signal) carrying one
//!   [`ChangeEvent`](crate::ChangeEvent) (or
//!   [`EntryChangeEvent`](crate::EntryChangeEvent) for the dictionary) per
//!   successful operation. Connect with `subscribe`.
//!
//! | Container          | Operation         | Event                         |
//! |--------------------|-------------------|-------------------------------|
//! | [`BindList`]       | push, insert      | `Added(item)`                 |
//! |                    | set (if differs)  | `Modified(new item)`          |
//! |                    | remove, remove_at | `Removed(item)`               |
//! | [`BindDictionary`] | add               | `Added(key, value)`           |
//! |                    | set (if absent or differs) | `Modified(key, value)` |
//! |                    | remove            | `Removed(key, removed value)` |
//! | [`BindQueue`]      | enqueue           | `Added(item)`                 |
//! |                    | dequeue           | `Removed(item)`               |
//! |                    | peek              | `Peek(item)`                  |
//! | [`BindStack`]      | push              | `Added(item)`                 |
//! |                    | pop               | `Modified(item)`              |
//! |                    | peek              | `Peek(item)`                  |
//!
//! `clear` emits `Cleared` with default payloads on every container.
//!
//! Containers take `&self` for every operation and release their storage lock
//! before emitting, so handlers may read the container they observe.

mod dictionary;
mod list;
mod queue;
mod stack;

pub use dictionary::BindDictionary;
pub use list::BindList;
pub use queue::BindQueue;
pub use stack::BindStack;
