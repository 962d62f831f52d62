use std::{env, path::Path};

use image::ImageFormat;

use crate::error::ConfigError;

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub server_url: String,
    pub upload_limit_bytes: usize,
}

pub fn get_env() -> Result<Config, ConfigError> {
    config_from(
        env::var("NURDLE_SERVER_URL").ok(),
        env::var("UPLOAD_LIMIT_MB").ok(),
    )
}

fn config_from(
    server_url: Option<String>,
    limit_mb: Option<String>,
) -> Result<Config, ConfigError> {
    let upload_limit_bytes = {
        let raw = limit_mb.unwrap_or_else(|| "10".into());
        let mb = raw.trim().parse::<usize>().map_err(|_| ConfigError::Invalid {
            name: "UPLOAD_LIMIT_MB",
            expected: "a whole number of megabytes",
            value: raw.clone(),
        })?;
        mb * 1024 * 1024
    };

    let server_url = server_url.unwrap_or_else(|| DEFAULT_SERVER_URL.into());
    if !(server_url.starts_with("http://") || server_url.starts_with("https://")) {
        return Err(ConfigError::Invalid {
            name: "NURDLE_SERVER_URL",
            expected: "an http(s) URL",
            value: server_url,
        });
    }

    Ok(Config {
        server_url: server_url.trim_end_matches('/').to_string(),
        upload_limit_bytes,
    })
}

/// Content type for an image file, judged by its extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    match ImageFormat::from_path(path) {
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::Bmp) => "image/bmp",
        Ok(ImageFormat::Tiff) => "image/tiff",
        _ => "application/octet-stream",
    }
}
