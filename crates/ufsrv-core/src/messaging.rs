//! Send side: turning a command into a request for the transport layer.
//!
//! [`CommandSender`] finalizes a command, encrypts its wire bytes once per
//! destination device and packs the results into an
//! [`OutgoingPushMessageList`] together with the route and headers the
//! server expects. The transport itself lives outside this crate.
//!
//! When a device has no session yet, the command is handed to the
//! configured [`JobSink`] instead of failing, and can be prepared again
//! later with [`CommandSender::prepare_due`].
//!
//! ## Example
//!
//! ```ignore
//! use ufsrv_core::messaging::{CommandSender, Destination, SendOptions, SendOutcome};
//!
//! let sender = CommandSender::new(cipher, credentials, config.send.clone())
//!     .with_job_sink(outbox.clone());
//! match sender.send(&mut command, &Destination::new("uid-bob", vec![1, 2]), SendOptions::now())? {
//!     SendOutcome::Ready(request) => transport.put(request.path(), request.headers(), request.to_json()?),
//!     SendOutcome::Queued(job) => tracing::info!(%job, "Send deferred"),
//! }
//! ```

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use tracing::{debug, info, warn};
use ufsrv_crypto::{ProtocolAddress, UnidentifiedAccess};
use ufsrv_protocol::{
    Command, CredentialsProvider, EnvelopeCipher, OutgoingPushMessageList, ProtocolError,
    TransportType,
};
use ufsrv_store::{CommandOutbox, JobId, JobSink};

use crate::config::SendConfig;
use crate::{CoreError, Result};

/// Header carrying the base64 unidentified access key.
pub const UNIDENTIFIED_ACCESS_HEADER: &str = "Unidentified-Access-Key";

/// Header carrying the account's session cookie.
pub const COOKIE_HEADER: &str = "X-Ufsrv-Cookie";

/// Header carrying the request hash of integrity-sensitive commands.
pub const INTEGRITY_HEADER: &str = "X-Ufsrv-Integrity";

/// Content type of every request body.
pub const CONTENT_TYPE: &str = "application/json";

/// A destination account and the devices to encrypt for.
#[derive(Clone, Debug)]
pub struct Destination {
    /// Account identifier.
    pub name: String,
    /// Device ids.
    pub devices: Vec<u32>,
    /// Sealed-sender access, when the destination allows it.
    pub unidentified_access: Option<UnidentifiedAccess>,
}

impl Destination {
    /// A destination reached over identified sessions.
    pub fn new(name: impl Into<String>, devices: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            devices,
            unidentified_access: None,
        }
    }

    /// Use sealed sender.
    pub fn with_unidentified_access(mut self, access: UnidentifiedAccess) -> Self {
        self.unidentified_access = Some(access);
        self
    }
}

/// Per-send options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendOptions {
    /// Client timestamp in milliseconds.
    pub timestamp: u64,
    /// Online-only (ephemeral) delivery.
    pub online: bool,
}

impl SendOptions {
    /// Options stamped with the current time.
    pub fn now() -> Self {
        Self {
            timestamp: u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default(),
            online: false,
        }
    }

    /// Mark the send as online-only.
    pub fn online(mut self) -> Self {
        self.online = true;
        self
    }
}

/// A request ready for the transport layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingRequest {
    path: String,
    transport: TransportType,
    headers: Vec<(String, String)>,
    body: OutgoingPushMessageList,
}

impl OutgoingRequest {
    /// Server route.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Channel to send on.
    pub fn transport(&self) -> TransportType {
        self.transport
    }

    /// Request headers, in insertion order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Message list.
    pub fn body(&self) -> &OutgoingPushMessageList {
        &self.body
    }

    /// JSON request body.
    pub fn to_json(&self) -> Result<String> {
        Ok(self.body.to_json()?)
    }
}

/// Result of [`CommandSender::send`].
#[derive(Clone, Debug)]
pub enum SendOutcome {
    /// Every device was encrypted for.
    Ready(OutgoingRequest),
    /// A device had no session; the command was queued.
    Queued(JobId),
}

/// Builds outgoing requests for one local account.
pub struct CommandSender {
    cipher: Arc<EnvelopeCipher>,
    credentials: Arc<dyn CredentialsProvider>,
    sink: Option<Arc<dyn JobSink>>,
    config: SendConfig,
}

impl CommandSender {
    /// Create a sender without a job sink.
    pub fn new(
        cipher: Arc<EnvelopeCipher>,
        credentials: Arc<dyn CredentialsProvider>,
        config: SendConfig,
    ) -> Self {
        Self {
            cipher,
            credentials,
            sink: None,
            config,
        }
    }

    /// Queue commands into `sink` when a session is missing.
    pub fn with_job_sink(mut self, sink: Arc<dyn JobSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Finalize `command` and encrypt it for every device of `destination`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NoDevices`] if the destination lists no device
    /// - [`CoreError::Protocol`] for cipher failures that cannot be deferred
    /// - [`CoreError::Store`] if queueing fails
    pub fn send(
        &self,
        command: &mut Command,
        destination: &Destination,
        options: SendOptions,
    ) -> Result<SendOutcome> {
        command.finalize();

        match self.build_request(command, destination, options) {
            Ok(request) => Ok(SendOutcome::Ready(request)),
            Err(CoreError::Protocol(error)) if self.can_defer(&error) => {
                let Some(sink) = &self.sink else {
                    return Err(CoreError::Protocol(error));
                };
                let job = sink.enqueue(command, &destination.name)?;
                warn!(
                    destination = %destination.name,
                    kind = %command.kind(),
                    %job,
                    %error,
                    "No session with destination, command queued"
                );
                Ok(SendOutcome::Queued(job))
            }
            Err(error) => Err(error),
        }
    }

    /// Prepare every job of `outbox` due at `now`.
    ///
    /// `resolve` maps a job's destination to its current devices; jobs whose
    /// destination no longer resolves are marked failed. Prepared jobs are
    /// marked as sending and returned with their request; the caller marks
    /// them sent once the transport confirms.
    pub fn prepare_due<F>(
        &self,
        outbox: &CommandOutbox,
        now: i64,
        resolve: F,
    ) -> Result<Vec<(JobId, OutgoingRequest)>>
    where
        F: Fn(&str) -> Option<Destination>,
    {
        let mut prepared = Vec::new();

        for job in outbox.due(now)? {
            let Some(destination) = resolve(&job.destination) else {
                outbox.mark_failed(&job.id, "destination not resolvable")?;
                continue;
            };

            let mut command = outbox.restore(&job.id)?;
            command.finalize();

            let options = SendOptions {
                timestamp: u64::try_from(now.saturating_mul(1000)).unwrap_or_default(),
                online: false,
            };

            match self.build_request(&command, &destination, options) {
                Ok(request) => {
                    outbox.mark_sending(&job.id)?;
                    prepared.push((job.id, request));
                }
                Err(error) => {
                    let status = outbox.mark_failed(&job.id, &error.to_string())?;
                    debug!(job = %job.id, ?status, %error, "Retry did not encrypt");
                }
            }
        }

        if !prepared.is_empty() {
            info!(count = prepared.len(), "Prepared queued commands");
        }
        Ok(prepared)
    }

    fn can_defer(&self, error: &ProtocolError) -> bool {
        self.config.queue_on_missing_session
            && error.crypto_source().is_some_and(|source| source.is_retryable())
    }

    fn build_request(
        &self,
        command: &Command,
        destination: &Destination,
        options: SendOptions,
    ) -> Result<OutgoingRequest> {
        if destination.devices.is_empty() {
            return Err(CoreError::NoDevices(destination.name.clone()));
        }

        let path = command
            .server_path_args()
            .ok_or_else(|| CoreError::NoRoute(command.kind().to_string()))?;
        let plaintext = command.to_bytes()?;
        let access = destination.unidentified_access.as_ref();

        let messages = destination
            .devices
            .iter()
            .map(|&device| {
                let address = ProtocolAddress::new(destination.name.as_str(), device);
                self.cipher.encrypt(&address, access, &plaintext, command)
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut headers = vec![("Content-Type".to_string(), CONTENT_TYPE.to_string())];
        match access {
            Some(access) => headers.push((
                UNIDENTIFIED_ACCESS_HEADER.to_string(),
                BASE64.encode(access.access_key()),
            )),
            None => headers.push((
                COOKIE_HEADER.to_string(),
                self.credentials.session_cookie().to_string(),
            )),
        }
        if let Some(token) = command.request_integrity_token(self.credentials.as_ref()) {
            headers.push((INTEGRITY_HEADER.to_string(), token));
        }

        let transport = match command.transport_type() {
            TransportType::Undefined => self.config.default_transport,
            chosen => chosen,
        };

        debug!(
            destination = %destination.name,
            kind = %command.kind(),
            devices = messages.len(),
            ?transport,
            "Built outgoing request"
        );

        Ok(OutgoingRequest {
            path,
            transport,
            headers,
            body: OutgoingPushMessageList::new(
                destination.name.as_str(),
                options.timestamp,
                messages,
                options.online,
            ),
        })
    }
}
