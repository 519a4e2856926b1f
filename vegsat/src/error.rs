use std::path::PathBuf;
use thiserror::Error;

/// Error taxonomy for the acquisition pipeline.
///
/// Stage-fatal variants abort the run; `Download` and `BandNotFound` are
/// per-item and are collected at the item boundary so sibling products keep
/// processing.
#[derive(Debug, Error)]
pub enum VegsatError {
    #[error("Configuration file not found: {path}")]
    MissingFile { path: PathBuf },

    #[error("Required capability unavailable: {capability}")]
    MissingDependency { capability: String },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    #[error("Survey input not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Field '{field}' missing from survey records in {path}")]
    FieldMissing { field: String, path: PathBuf },

    #[error("Invalid survey record {line} in {path}: {reason}")]
    InvalidRecord {
        line: u64,
        path: PathBuf,
        reason: String,
    },

    #[error("Catalog rejected credentials at {api_url}")]
    Authentication { api_url: String },

    #[error("Catalog query failed: {reason}")]
    Query { reason: String },

    #[error("Download failed for product {id}: {reason}")]
    Download { id: String, reason: String },

    #[error("Band {band} not found under {dir}")]
    BandNotFound { band: String, dir: PathBuf },

    #[error("Raster error: {reason}")]
    Raster { reason: String },

    #[error(transparent)]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Projection error: {0}")]
    Projection(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VegsatError>;
