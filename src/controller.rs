use std::mem;

use log::{debug, error, info, warn};
use tokio::task::JoinHandle;

use crate::{
    camera::{
        CaptureSession, FacingMode, MediaProvider, MediaStream, PreviewSink, CAPTURE_JPEG_QUALITY,
    },
    client::{DetectionResult, UploadClient},
    error::{CameraError, SubmitError},
    geolocation::{spawn_acquisition, GeolocationProvider, GeolocationSample, SharedLocation},
    payload::{FormData, UploadRequest},
    view::{Status, View},
};

pub const CAPTURE_FIELD: &str = "image";
pub const CAPTURE_FILENAME: &str = "capture.jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraPhase {
    Closed,
    Opening,
    Open,
    Capturing,
}

enum CameraState<S: MediaStream> {
    Closed,
    Opening,
    Open(CaptureSession<S>),
    Capturing,
}

/// Collects a photo from a form or the camera, tags it with the device
/// location when one is known, and posts it for detection.
pub struct Controller<M: MediaProvider, V: View> {
    client: UploadClient,
    media: M,
    view: V,
    location: SharedLocation,
    location_task: Option<JoinHandle<()>>,
    camera: CameraState<M::Stream>,
    preview: PreviewSink,
}

impl<M: MediaProvider, V: View> Controller<M, V> {
    /// Builds the controller and fires the one-shot location request. Must be
    /// called from within a tokio runtime.
    pub fn new<G: GeolocationProvider>(
        client: UploadClient,
        media: M,
        view: V,
        geolocation: G,
    ) -> Self {
        let location = SharedLocation::default();
        let location_task = spawn_acquisition(geolocation, location.clone());
        Self {
            client,
            media,
            view,
            location,
            location_task,
            camera: CameraState::Closed,
            preview: PreviewSink::default(),
        }
    }

    /// Waits for the location request to settle, successfully or not.
    pub async fn wait_for_location(&mut self) {
        if let Some(task) = self.location_task.take() {
            if let Err(err) = task.await {
                warn!("Location task ended abnormally: {}", err);
            }
        }
    }

    pub async fn location(&self) -> Option<GeolocationSample> {
        *self.location.lock().await
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn preview(&self) -> &PreviewSink {
        &self.preview
    }

    pub fn camera_phase(&self) -> CameraPhase {
        match self.camera {
            CameraState::Closed => CameraPhase::Closed,
            CameraState::Opening => CameraPhase::Opening,
            CameraState::Open(_) => CameraPhase::Open,
            CameraState::Capturing => CameraPhase::Capturing,
        }
    }

    pub async fn submit_image(
        &mut self,
        mut request: UploadRequest,
    ) -> Result<DetectionResult, SubmitError> {
        if let Some(sample) = self.location().await {
            request.attach_location(&sample);
        }

        self.view.set_status(Status::Processing);
        self.view.hide_result_image();

        match self.client.upload(request).await {
            Ok(result) => {
                info!(
                    "Detected {} objects ({} nurdles, {} beads)",
                    result.total, result.nurdles, result.beads
                );
                self.view.show_result_image(&result.data_uri());
                self.view.set_status(Status::Detected {
                    total: result.total,
                    nurdles: result.nurdles,
                    beads: result.beads,
                });
                Ok(result)
            }
            Err(err) => {
                warn!("Upload to {} failed: {}", self.client.endpoint(), err);
                self.view.set_status(Status::Failed);
                Err(err)
            }
        }
    }

    pub async fn submit_form(&mut self, form: FormData) -> Result<DetectionResult, SubmitError> {
        self.submit_image(UploadRequest::from_form(form)).await
    }

    /// Shows the overlay and asks for the rear camera. A request made while a
    /// stream is already open is ignored.
    pub async fn open_camera(&mut self) -> Result<(), CameraError> {
        if let CameraState::Open(_) = self.camera {
            debug!("Camera already open, ignoring request");
            return Ok(());
        }

        self.camera = CameraState::Opening;
        self.view.show_overlay();
        let mut camera = SettleCamera(self);

        match camera.0.media.open(FacingMode::Environment).await {
            Ok(stream) => {
                info!("Camera stream {} opened", stream.id());
                camera.0.preview.bind(stream.id());
                camera.0.camera = CameraState::Open(CaptureSession::new(stream));
                Ok(())
            }
            Err(err) => {
                camera.0.camera = CameraState::Closed;
                camera.0.view.alert(&format!("Error accessing camera: {}", err));
                camera.0.view.hide_overlay();
                Err(err)
            }
        }
    }

    pub fn close_camera(&mut self) {
        // Dropping the session stops its tracks.
        drop(mem::replace(&mut self.camera, CameraState::Closed));
        self.preview.clear();
        self.view.hide_overlay();
    }

    /// Snapshots the open stream and submits it, then closes the camera
    /// whatever the outcome. Returns `Ok(None)` when no stream is open.
    pub async fn capture(&mut self) -> Result<Option<DetectionResult>, SubmitError> {
        let mut session = match mem::replace(&mut self.camera, CameraState::Capturing) {
            CameraState::Open(session) => session,
            other => {
                self.camera = other;
                debug!("Capture requested with no active stream");
                return Ok(None);
            }
        };

        let mut camera = SettleCamera(self);
        let outcome = camera.0.capture_and_submit(&mut session).await;
        drop(session);
        outcome.map(Some)
    }

    async fn capture_and_submit(
        &mut self,
        session: &mut CaptureSession<M::Stream>,
    ) -> Result<DetectionResult, SubmitError> {
        let jpeg = match session.snapshot_jpeg(CAPTURE_JPEG_QUALITY) {
            Ok(jpeg) => jpeg,
            Err(err) => {
                error!("Failed to capture frame: {}", err);
                self.view.alert(&format!("Error capturing photo: {}", err));
                return Err(err.into());
            }
        };
        let request = UploadRequest::image(CAPTURE_FIELD, jpeg, CAPTURE_FILENAME, "image/jpeg");
        self.submit_image(request).await
    }
}

/// Closes the camera when dropped if it is still opening or capturing, so a
/// cancelled `open_camera` or `capture` leaves no overlay or preview behind.
struct SettleCamera<'a, M: MediaProvider, V: View>(&'a mut Controller<M, V>);

impl<M: MediaProvider, V: View> Drop for SettleCamera<'_, M, V> {
    fn drop(&mut self) {
        if matches!(self.0.camera, CameraState::Opening | CameraState::Capturing) {
            self.0.close_camera();
        }
    }
}
