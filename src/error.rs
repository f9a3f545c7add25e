//! Error types for the session pipeline and server loop.
//!
//! Spec'd error kinds: programmer error (loud abort), per-datagram parse
//! failure (trace + drop, not an `Err` at all), per-session fault (debug log
//! + terminate session, also not an `Err`; sessions fail by becoming
//! `Broken`, never by unwinding), resource exhaustion (drop datagram, or
//! fatal to the server loop), end of input (not modeled). `CoreError` covers
//! the first and last of those categories that actually need a `Result`:
//! invalid configuration at construction time, and fatal server-loop
//! conditions.

use thiserror::Error;

/// Errors that can be returned from fallible constructors and from the
/// server loop when a condition is fatal to the whole run.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A `ServerConfig` value failed validation. These are programmer
    /// errors: the caller is expected to fix the config, not retry.
    #[error("invalid configuration: {0}")]
    Config(&'static str),

    /// Registering a route or a port that is already registered.
    #[error("duplicate registration: {0}")]
    DuplicateRegistration(&'static str),

    /// The sample buffer composer could not produce a buffer. Fatal to the
    /// server loop per spec §7 ("output buffer exhaustion terminates the
    /// server loop after logging").
    #[error("sample buffer composer exhausted")]
    SampleBufferExhausted,

    /// The session pool could not produce a session. Per spec §7 this only
    /// drops the triggering datagram; it is surfaced as an error so callers
    /// of `SessionManager::store` can count/log it, not to abort anything.
    #[error("session pool exhausted")]
    SessionPoolExhausted,
}
