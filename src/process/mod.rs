//! Process lifecycle tracking.
//!
//! A run moves through `ProcessState`s in a fixed order. The `ProcessTracker`
//! owns that state and broadcasts every transition to the registered
//! `ProcessObserver`s:
//!
//! | Transition                  | State after        |
//! |-----------------------------|--------------------|
//! | `started`                   | `STARTED`          |
//! | `clone_repo`                | `CLONE_REPO`       |
//! | `retrieve_changed_file_set` | `RETRIEVE_FILES`   |
//! | `retrieve_file_from_commit` | unchanged          |
//! | `lint_file`                 | `LINT_FILES`       |
//! | `report_lint`               | `REPORT`           |
//! | `finish`                    | `FINISHED`         |

pub mod log_observer;
pub mod observer;
pub mod state;
pub mod tracker;

pub use log_observer::LogObserver;
pub use observer::{NoopObserver, ProcessObserver};
pub use state::{ProcessEvent, ProcessState};
pub use tracker::{NotifyResult, ProcessTracker};
