use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to spawn worker `{name}`")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("worker `{name}` panicked")]
    Panicked { name: String },
    #[error("worker `{name}` is not running")]
    NotRunning { name: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("`{field}` must be greater than zero")]
    Zero { field: &'static str },
    #[error("invalid value range [{low}, {high}]")]
    InvalidRange { low: f64, high: f64 },
    #[error("thread pinning requested but no cores were detected")]
    NoCores,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
