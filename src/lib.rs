//! Client for the nurdle detection service.
//!
//! A [`Controller`] takes a photo from an upload form or a camera snapshot,
//! attaches the device location when one was acquired, posts it to the
//! server's `/upload` endpoint and hands the annotated result to a [`View`].

pub mod camera;
pub mod client;
pub mod controller;
pub mod error;
pub mod geolocation;
pub mod payload;
pub mod utils;
pub mod view;

pub use client::{DetectionResult, UploadClient};
pub use controller::{CameraPhase, Controller};
pub use view::{Status, View};
