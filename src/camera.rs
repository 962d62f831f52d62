use std::{
    future::Future,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use image::{codecs::jpeg::JpegEncoder, ColorType, ImageError, RgbImage};
use log::debug;

use crate::error::CameraError;

pub const CAPTURE_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    Environment,
    User,
}

/// One track of a media stream. Clones share the same live flag.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    kind: &'static str,
    live: Arc<AtomicBool>,
}

impl MediaTrack {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

pub trait MediaStream: Send {
    fn id(&self) -> &str;
    fn tracks(&self) -> &[MediaTrack];
    /// The current video frame at the stream's native resolution.
    fn grab_frame(&mut self) -> Result<RgbImage, CameraError>;
}

pub trait MediaProvider: Send + Sync {
    type Stream: MediaStream;

    fn open(
        &self,
        facing: FacingMode,
    ) -> impl Future<Output = Result<Self::Stream, CameraError>> + Send;
}

/// Where the live preview is attached.
#[derive(Debug, Default)]
pub struct PreviewSink {
    source: Option<String>,
}

impl PreviewSink {
    pub fn bind(&mut self, stream_id: &str) {
        self.source = Some(stream_id.to_string());
    }

    pub fn clear(&mut self) {
        self.source = None;
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

/// An open stream. Every track is stopped when the session is dropped.
pub struct CaptureSession<S: MediaStream> {
    stream: S,
}

impl<S: MediaStream> CaptureSession<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn snapshot_jpeg(&mut self, quality: u8) -> Result<Vec<u8>, CameraError> {
        let frame = self.stream.grab_frame()?;
        Ok(encode_jpeg(&frame, quality)?)
    }

    fn stop_tracks(&self) {
        for track in self.stream.tracks() {
            track.stop();
        }
    }
}

impl<S: MediaStream> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        self.stop_tracks();
        debug!("Stopped tracks of stream {}", self.stream.id());
    }
}

pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode(
        frame.as_raw(),
        frame.width(),
        frame.height(),
        ColorType::Rgb8,
    )?;
    Ok(buf)
}

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// A camera whose live frame is a still image loaded from disk.
pub struct StillFrameCamera {
    path: PathBuf,
}

impl StillFrameCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

pub struct StillFrameStream {
    id: String,
    frame: RgbImage,
    tracks: Vec<MediaTrack>,
}

impl StillFrameStream {
    pub fn new(frame: RgbImage) -> Self {
        Self {
            id: format!("still-{}", NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed)),
            frame,
            tracks: vec![MediaTrack::new("video")],
        }
    }
}

impl MediaStream for StillFrameStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    fn grab_frame(&mut self) -> Result<RgbImage, CameraError> {
        if !self.tracks.iter().any(MediaTrack::is_live) {
            return Err(CameraError::Frame("stream has ended".into()));
        }
        Ok(self.frame.clone())
    }
}

impl MediaProvider for StillFrameCamera {
    type Stream = StillFrameStream;

    async fn open(&self, facing: FacingMode) -> Result<StillFrameStream, CameraError> {
        debug!("Opening {:?}-facing still camera on {}", facing, self.path.display());
        let path = self.path.clone();
        let frame = tokio::task::spawn_blocking(move || image::open(&path))
            .await
            .map_err(|e| CameraError::Denied(e.to_string()))?
            .map_err(|e| CameraError::Denied(e.to_string()))?;
        Ok(StillFrameStream::new(frame.to_rgb8()))
    }
}

/// For flows that never open a camera. Every request is refused.
pub struct NoCamera;

impl MediaProvider for NoCamera {
    type Stream = StillFrameStream;

    async fn open(&self, _facing: FacingMode) -> Result<StillFrameStream, CameraError> {
        Err(CameraError::Denied("no camera available".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_frame_is_a_jpeg_of_native_size() {
        let frame = RgbImage::from_pixel(32, 24, image::Rgb([10, 200, 30]));
        let bytes = encode_jpeg(&frame, CAPTURE_JPEG_QUALITY).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }

    #[test]
    fn dropping_session_stops_every_track() {
        let stream = StillFrameStream::new(RgbImage::new(2, 2));
        let tracks = stream.tracks().to_vec();
        let session = CaptureSession::new(stream);
        assert!(tracks.iter().all(MediaTrack::is_live));

        drop(session);
        assert!(tracks.iter().all(|t| !t.is_live()));
    }

    #[test]
    fn stopped_stream_yields_no_frame() {
        let mut stream = StillFrameStream::new(RgbImage::new(2, 2));
        stream.tracks()[0].stop();
        assert!(matches!(stream.grab_frame(), Err(CameraError::Frame(_))));
    }

    #[test]
    fn preview_sink_binds_and_clears() {
        let mut sink = PreviewSink::default();
        sink.bind("still-7");
        assert_eq!(sink.source(), Some("still-7"));
        sink.clear();
        assert_eq!(sink.source(), None);
    }

    #[tokio::test]
    async fn no_camera_refuses_every_open() {
        assert!(matches!(
            NoCamera.open(FacingMode::Environment).await,
            Err(CameraError::Denied(_))
        ));
    }

    #[tokio::test]
    async fn missing_still_frame_is_a_denied_grant() {
        let camera = StillFrameCamera::new("/nonexistent/frame.jpg");
        assert!(matches!(
            camera.open(FacingMode::Environment).await,
            Err(CameraError::Denied(_))
        ));
    }
}
