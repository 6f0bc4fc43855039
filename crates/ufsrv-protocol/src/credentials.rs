//! Account credentials consumed by the command and cipher layers.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Source of the local account's credentials.
///
/// Injected wherever a request hash or device id is needed; there is no
/// process-wide credentials state.
pub trait CredentialsProvider: Send + Sync {
    /// Local account identifier.
    fn account_id(&self) -> &str;

    /// Current server session cookie.
    fn session_cookie(&self) -> &str;

    /// Signaling key, if the account has one.
    fn signaling_key(&self) -> Option<&str>;

    /// Local device id.
    fn device_id(&self) -> u32;
}

/// Fixed credentials, wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct StaticCredentialsProvider {
    account_id: String,
    session_cookie: String,
    signaling_key: Option<String>,
    device_id: u32,
}

impl StaticCredentialsProvider {
    /// Create a provider.
    pub fn new(
        account_id: impl Into<String>,
        session_cookie: impl Into<String>,
        signaling_key: Option<String>,
        device_id: u32,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            session_cookie: session_cookie.into(),
            signaling_key,
            device_id,
        }
    }
}

impl CredentialsProvider for StaticCredentialsProvider {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    fn session_cookie(&self) -> &str {
        &self.session_cookie
    }

    fn signaling_key(&self) -> Option<&str> {
        self.signaling_key.as_deref()
    }

    fn device_id(&self) -> u32 {
        self.device_id
    }
}

impl fmt::Debug for StaticCredentialsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentialsProvider")
            .field("account_id", &self.account_id)
            .field("session_cookie", &"[REDACTED]")
            .field("signaling_key", &self.signaling_key.as_ref().map(|_| "[REDACTED]"))
            .field("device_id", &self.device_id)
            .finish()
    }
}
