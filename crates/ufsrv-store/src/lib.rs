//! # ufsrv-store
//!
//! Persistent job sink for commands that could not be sent right away.
//!
//! Commands are stored in their versioned opaque form inside a `sled` tree
//! together with a delivery status, a retry counter and the time of the next
//! attempt. A failed attempt reschedules the job with exponential backoff
//! until the retry limit is reached; jobs older than the TTL expire.
//!
//! ## Example
//!
//! ```ignore
//! use ufsrv_store::{CommandOutbox, JobSink};
//!
//! let db = sled::open("outbox.db")?;
//! let outbox = CommandOutbox::new(&db)?;
//! let id = outbox.enqueue(&command, "uid-ada")?;
//! for job in outbox.due(chrono::Utc::now().timestamp())? {
//!     let command = outbox.restore(&job.id)?;
//!     // ...send, then mark_sent or mark_failed
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod outbox;

pub use error::{Result, StoreError};
pub use outbox::{CommandOutbox, JobId, JobSink, JobStatus, OutboxStats, QueuedJob, RetryPolicy};
