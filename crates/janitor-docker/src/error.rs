use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockerError {
    #[error("Docker connection failed: {0}")]
    ConnectionError(String),

    #[error("Exec in container {container} failed: {message}")]
    ExecError { container: String, message: String },

    #[error("Docker API error: {0}")]
    ApiError(#[from] bollard::errors::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DockerError>;
