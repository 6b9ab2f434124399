// src/services/mod.rs
//
// Shared runtime services used by the session and table modules:
// time, recurring tasks and user-visible notifications

pub mod clock;
pub mod notifier;
pub mod scheduler;

// Re-export commonly used types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use notifier::{Notice, NoticeLevel, Notifier, RecordingNotifier, TracingNotifier};
pub use scheduler::{spawn_periodic, FirstRun, TaskHandle};
