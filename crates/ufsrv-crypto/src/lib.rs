//! # ufsrv-crypto
//!
//! Session-cipher boundary for the ufsrv messaging protocol.
//!
//! The double-ratchet, sealed-sender and sender-key primitives are provided by
//! an external library. This crate defines what the envelope cipher needs from
//! it and from the application's key database:
//!
//! - **Addresses**: [`ProtocolAddress`] (account + device) and
//!   [`ServiceAddress`] (uuid and/or ufsrv uid)
//! - **Cipher traits**: [`SessionCipher`], [`SealedSessionCipher`],
//!   [`GroupCipher`]
//! - **Store**: [`ProtocolStore`] with an in-memory reference implementation
//! - **Locking**: [`SessionLock`], the single exclusive lock domain over
//!   ratchet state
//! - **Digests**: SHA-256 request hashing for integrity-sensitive commands
//! - **Errors**: the [`CryptoError`] family and its [`Recovery`] mapping
//!
//! With the `test-utils` feature, [`testing`] provides loopback backends.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod cipher;
pub mod digest;
pub mod error;
pub mod lock;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use address::{DEFAULT_DEVICE_ID, ProtocolAddress, ServiceAddress};
pub use cipher::{
    CiphertextMessage, CiphertextType, ContentHint, DistributionId, GroupCipher,
    SealedDecryption, SealedSessionCipher, SenderCertificate, SessionCipher,
    UnidentifiedAccess, UnidentifiedSenderContent,
};
pub use digest::{integrity_token, sha256_hex, tokens_match};
pub use error::{CryptoError, Recovery, Result};
pub use lock::{SessionLock, SessionLockGuard};
pub use store::{MemoryProtocolStore, ProtocolStore, SessionRecord};
