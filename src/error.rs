pub type DeployResult<T> = Result<T, DeployError>;

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("SSH connection failed: {0}")]
    SshFailed(String),

    #[error("SFTP {op} failed on {path}: {message}")]
    Sftp {
        op: &'static str,
        path: String,
        message: String,
    },

    #[error("remote command exited with status {status}: {output}")]
    RemoteCommand { status: i32, output: String },

    #[error("build failed: {0}")]
    BuildFailed(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("value for {placeholder} is not safe to substitute: {value:?}")]
    PlaceholderCollision { placeholder: String, value: String },

    #[error("cache purge rejected (HTTP {status}): {message}")]
    PurgeRejected { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("cancelled before {0}")]
    Cancelled(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DeployError {
    /// Wrap an `ssh2` failure from an SFTP call.
    pub(crate) fn sftp(op: &'static str, path: &str, err: &ssh2::Error) -> Self {
        Self::Sftp {
            op,
            path: path.to_string(),
            message: err.message().to_string(),
        }
    }
}
