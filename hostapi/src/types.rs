//! Fixed lengths and host configuration.
//!
//! The byte lengths below are checked at every crypto bridge entry point.
//! A buffer of any other length yields the operation's sentinel.

/// Length of a secp256k1 secret key.
pub const SECRET_KEY_LEN: usize = 32;

/// Length of an x-only (BIP-340) public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length of a SHA-256 digest, and of the message a Schnorr signature covers.
pub const DIGEST_LEN: usize = 32;

/// Length of a BIP-340 Schnorr signature.
pub const SIGNATURE_LEN: usize = 64;

/// Length of a lowercase hex-encoded digest.
pub const DIGEST_HEX_LEN: usize = DIGEST_LEN * 2;

/// Environment variable holding the `tracing` filter directive.
pub const ENV_LOG: &str = "SIGIL_LOG";

/// Environment variable enabling per-operation allocator trace events.
pub const ENV_TRACE_ALLOC: &str = "SIGIL_TRACE_ALLOC";

/// What the curve context is allowed to do.
///
/// The entrypoint creates its context with both capabilities. A bridge call
/// that needs a missing capability returns its sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub sign: bool,
    pub verify: bool,
}

impl Capabilities {
    /// Signing and verification.
    pub const SIGN_VERIFY: Self = Self {
        sign: true,
        verify: true,
    };

    /// Verification only.
    pub const VERIFY_ONLY: Self = Self {
        sign: false,
        verify: true,
    };
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::SIGN_VERIFY
    }
}

/// Configuration for one host run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// `tracing-subscriber` filter directive (e.g. `warn`, `sigil_host=debug`).
    pub log_filter: String,
    /// Emit a trace event for every allocate/deallocate/reallocate.
    pub trace_allocations: bool,
    /// Capabilities of the curve context created at startup.
    pub capabilities: Capabilities,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            log_filter: "warn".to_string(),
            trace_allocations: false,
            capabilities: Capabilities::SIGN_VERIFY,
        }
    }
}

impl HostConfig {
    /// Build a config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    ///
    /// Unset variables keep their defaults. `SIGIL_TRACE_ALLOC` accepts
    /// `1`, `true`, `yes` and `on` (case-insensitive).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(filter) = lookup(ENV_LOG) {
            let filter = filter.trim();
            if !filter.is_empty() {
                config.log_filter = filter.to_string();
            }
        }
        if let Some(flag) = lookup(ENV_TRACE_ALLOC) {
            config.trace_allocations = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        config
    }
}
