//! # ufsrv-core
//!
//! Send and receive services over the ufsrv command protocol.
//!
//! ## Quick Start
//!
//! ```ignore
//! use ufsrv_core::{ClientConfig, CommandSender, EnvelopeProcessor, ReceivePipeline};
//!
//! let config = ClientConfig::builder().with_account("uid-ada", 1).build_validated()?;
//! let cipher = Arc::new(EnvelopeCipher::new(store, lock, backends, local).with_policy(config.decrypt_policy()));
//!
//! let sender = CommandSender::new(cipher.clone(), credentials, config.send.clone())
//!     .with_job_sink(outbox);
//! let pipeline = ReceivePipeline::new(EnvelopeProcessor::new(cipher), config.receive.worker_concurrency);
//! let outcomes = pipeline.process_batch(envelopes).await?;
//! ```
//!
//! ## Services
//!
//! - **CommandSender**: finalize, encrypt per device, build the outgoing
//!   request; defer to the outbox when a session is missing
//! - **EnvelopeProcessor**: decode and decrypt, then map failures to a
//!   [`ReceiveOutcome`]
//! - **ReceivePipeline**: async batch processing on a bounded worker pool

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod messaging;
pub mod pipeline;
pub mod receiving;

pub use config::{
    AccountConfig, ClientConfig, ClientConfigBuilder, ConfigError, OutboxConfig, ReceiveConfig,
    SendConfig,
};
pub use error::{CoreError, Result};
pub use messaging::{CommandSender, Destination, OutgoingRequest, SendOptions, SendOutcome};
pub use pipeline::ReceivePipeline;
pub use receiving::{EnvelopeProcessor, ReceiveOutcome, ReceiveSummary, ReceivedCommand};
