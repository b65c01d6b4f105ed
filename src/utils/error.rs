use thiserror::Error;

/// Errors surfaced while bringing the hub up.
///
/// Nothing inside the delivery path produces a `HubError`: send failures and
/// liveness timeouts are recovered locally by evicting the affected
/// connection, and publishing onto the bus is fire-and-forget. Only startup
/// concerns (configuration, binding listeners) propagate to the caller.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
}
