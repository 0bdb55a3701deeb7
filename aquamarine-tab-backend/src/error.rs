use thiserror::Error;

/// Failure to establish or maintain the Shift session connection.
///
/// Per the error-handling design, this is the only error surfaced past the
/// backend boundary — everything else (acquire backpressure, protocol
/// warnings, submit failures) is recovered locally and logged.
#[derive(Debug, Error)]
pub enum SessionError {
	#[error("tab_client_connect failed (no session socket, or handshake rejected)")]
	ConnectFailed,
	#[error("session reported an error: {0}")]
	Session(String),
}
