use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeolocationError {
    #[error("geolocation is not supported on this platform")]
    Unsupported,
    #[error("permission to read the location was denied")]
    Denied,
    #[error("location unavailable: {0}")]
    Unavailable(String),
    #[error("failed to read EXIF data: {0}")]
    Exif(#[from] exif::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("{0}")]
    Denied(String),
    #[error("failed to grab frame: {0}")]
    Frame(String),
    #[error("failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("server responded with {0}")]
    Status(StatusCode),
    #[error("malformed response body: {0}")]
    Malformed(#[source] reqwest::Error),
    #[error("payload of {size} bytes exceeds the {limit} byte upload limit")]
    TooLarge { size: usize, limit: usize },
    #[error("capture failed: {0}")]
    Capture(#[from] CameraError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}
