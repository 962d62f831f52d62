use std::{fmt, path::PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, error, info};

pub const FAILURE_MESSAGE: &str = "Failed to process the image.";

#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Processing,
    Detected { total: u64, nurdles: u64, beads: u64 },
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Processing => write!(f, "Processing..."),
            Status::Detected {
                total,
                nurdles,
                beads,
            } => write!(
                f,
                "Total detected: {}\nNurdles: {}\nBeads: {}",
                total, nurdles, beads
            ),
            Status::Failed => write!(f, "{}", FAILURE_MESSAGE),
        }
    }
}

/// Presentation surface the controller drives: the status text, the result
/// image, the camera overlay and blocking alerts.
pub trait View {
    fn set_status(&mut self, status: Status);
    fn show_result_image(&mut self, data_uri: &str);
    fn hide_result_image(&mut self);
    fn show_overlay(&mut self);
    fn hide_overlay(&mut self);
    fn alert(&mut self, message: &str);
}

/// Prints status to stdout and optionally writes the annotated image to disk.
pub struct TerminalView {
    output: Option<PathBuf>,
}

impl TerminalView {
    pub fn new(output: Option<PathBuf>) -> Self {
        Self { output }
    }
}

impl View for TerminalView {
    fn set_status(&mut self, status: Status) {
        println!("{}", status);
    }

    fn show_result_image(&mut self, data_uri: &str) {
        let Some(path) = &self.output else {
            return;
        };
        let encoded = data_uri
            .split_once(',')
            .map(|(_, data)| data)
            .unwrap_or(data_uri);
        match STANDARD.decode(encoded) {
            Ok(bytes) => match std::fs::write(path, bytes) {
                Ok(()) => info!("Annotated image written to {}", path.display()),
                Err(err) => error!("Failed to write {}: {}", path.display(), err),
            },
            Err(err) => error!("Annotated image is not valid base64: {}", err),
        }
    }

    fn hide_result_image(&mut self) {}

    fn show_overlay(&mut self) {
        debug!("Camera overlay shown");
    }

    fn hide_overlay(&mut self) {
        debug!("Camera overlay hidden");
    }

    fn alert(&mut self, message: &str) {
        eprintln!("{}", message);
    }
}
