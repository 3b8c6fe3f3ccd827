pub mod config;
pub mod macros;

mod error;
mod interactions;
mod predicate;
mod scheduler;
mod signal;
mod time;
mod update;
mod value;
mod value_map;
mod value_ref;
mod wire;

pub use error::{ConfigurationError, Result, Severity};
pub use interactions::{Interactions, Matcher, Reaction, Watch};
pub use predicate::{Changed, Predicate};
pub use scheduler::{ManualScheduler, Scheduler, Task, TimerHandle};
pub use signal::{Listeners, Replay, Signal, Sink, Subject, Subscription, Unsubscribe};
pub use time::{Duration, Timestamp};
pub use update::{Action, Case, Update};
pub use value::{Payload, Value, ValueKind};
pub use value_map::{Key, ValueMap};
pub use value_ref::{ValueRef, ValueRefMap};
pub use wire::{StringTableBuilder, ValueType, V};
