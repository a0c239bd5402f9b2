use thiserror::Error;

#[derive(Error, Debug)]
pub enum HaulError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote returned {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("Sheet error: {0}")]
    Sheet(String),

    #[error("Invalid alias table: {0}")]
    InvalidAlias(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, HaulError>;
