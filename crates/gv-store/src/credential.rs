use std::fmt;

/// Opaque access credential for a bundle store.
///
/// Injected by the hosting process and handed to the store backend as-is.
/// Never parsed or logged.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreCredential(String);

impl StoreCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Read the credential from an environment variable, if set and non-empty.
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var)
            .ok()
            .filter(|v| !v.is_empty())
            .map(Self)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StoreCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StoreCredential(<redacted>)")
    }
}
