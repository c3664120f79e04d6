use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The dispatcher script or the engine subprocess could not be set up.
    #[error("Spawn error: {0}")]
    Spawn(String),

    /// The dispatcher never answered the liveness probe before the deadline.
    #[error("Readiness timeout: {0}")]
    ReadinessTimeout(String),

    /// The dispatcher does not know the requested path.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A dispatcher handler faulted. Carries the response body verbatim.
    #[error("{0}")]
    Remote(String),

    /// The response body did not match the expected shape.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    /// A page navigation finished with a status other than `success`.
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Teardown error: {0}")]
    Teardown(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_displays_raw_message() {
        let err = Error::Remote("boom".to_string());
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_unexpected_status_display() {
        let err = Error::UnexpectedStatus {
            status: 418,
            body: "teapot".to_string(),
        };
        assert_eq!(err.to_string(), "Unexpected status 418: teapot");
    }
}
