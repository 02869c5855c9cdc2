use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("http status {status} for {url}")]
    Http { status: u16, url: String },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("no usable image candidate for {url}")]
    NoCandidate { url: String },

    #[error("degenerate image from {url} and fallback failed")]
    DegenerateImage { url: String },

    #[error("image transform failed: {0}")]
    Transform(String),

    #[error("catalog unreadable at {path}: {message}")]
    Catalog { path: PathBuf, message: String },

    #[error("invalid enrich request: {0}")]
    InvalidRequest(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EnrichError>;
