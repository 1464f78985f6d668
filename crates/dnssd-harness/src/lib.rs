//! DNS-SD exercise-run orchestration
//!
//! A [`Session`] drives one end-to-end exercise of a discovery
//! facility: it registers a service, attempts a conflicting duplicate
//! registration, browses for instances of the test type, resolves what
//! it finds, queries raw resource records, and enumerates browsing
//! domains — each as an independent asynchronous operation whose
//! events are handled by its own task, with dependent operations
//! started explicitly from inside the handling loop.
//!
//! The session's stage counter is the run's only completion signal:
//! the driver reads the current stage, then suspends in
//! [`Session::wait_for_change`] until the register chain terminates.

pub mod config;
pub mod error;
mod ops;
pub mod session;
pub mod stage;

pub use config::HarnessConfig;
pub use error::{HarnessError, Result};
pub use session::Session;
pub use stage::StageCounter;
