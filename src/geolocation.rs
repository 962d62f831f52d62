use std::{
    fs::File,
    future::Future,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
};

use exif::{In, Tag, Value};
use log::{info, warn};
use tokio::{sync::Mutex, task::JoinHandle};

use crate::error::GeolocationError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeolocationSample {
    pub latitude: f64,
    pub longitude: f64,
}

/// Single-shot position query.
pub trait GeolocationProvider: Send + Sync + 'static {
    fn is_supported(&self) -> bool {
        true
    }

    fn current_position(
        &self,
    ) -> impl Future<Output = Result<GeolocationSample, GeolocationError>> + Send;
}

/// Slot written once by the acquisition task and read on every submission.
pub type SharedLocation = Arc<Mutex<Option<GeolocationSample>>>;

/// Requests the position once in the background. The slot stays empty if the
/// provider is unsupported or the request fails.
pub fn spawn_acquisition<G: GeolocationProvider>(
    provider: G,
    slot: SharedLocation,
) -> Option<JoinHandle<()>> {
    if !provider.is_supported() {
        warn!("Geolocation not supported, uploads will carry no location");
        return None;
    }

    Some(tokio::spawn(async move {
        match provider.current_position().await {
            Ok(sample) => {
                info!(
                    "Location acquired: {}, {}",
                    sample.latitude, sample.longitude
                );
                *slot.lock().await = Some(sample);
            }
            Err(err) => warn!("Could not get location: {}", err),
        }
    }))
}

pub struct FixedGeolocation(pub GeolocationSample);

impl GeolocationProvider for FixedGeolocation {
    async fn current_position(&self) -> Result<GeolocationSample, GeolocationError> {
        Ok(self.0)
    }
}

pub struct NoGeolocation;

impl GeolocationProvider for NoGeolocation {
    fn is_supported(&self) -> bool {
        false
    }

    async fn current_position(&self) -> Result<GeolocationSample, GeolocationError> {
        Err(GeolocationError::Unsupported)
    }
}

/// Reads the coordinates a camera embedded in a photo's EXIF GPS block.
pub struct ExifGeolocation {
    path: PathBuf,
}

impl ExifGeolocation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl GeolocationProvider for ExifGeolocation {
    async fn current_position(&self) -> Result<GeolocationSample, GeolocationError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_gps(&path))
            .await
            .map_err(|e| GeolocationError::Unavailable(e.to_string()))?
    }
}

pub fn read_gps(path: &Path) -> Result<GeolocationSample, GeolocationError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut reader)?;

    let coord = |value: Tag, reference: Tag| -> Option<f64> {
        let value = exif.get_field(value, In::PRIMARY)?;
        let reference = exif.get_field(reference, In::PRIMARY)?;
        gps_degrees(&value.value, &ascii_ref(&reference.value)?)
    };

    match (
        coord(Tag::GPSLatitude, Tag::GPSLatitudeRef),
        coord(Tag::GPSLongitude, Tag::GPSLongitudeRef),
    ) {
        (Some(latitude), Some(longitude)) => Ok(GeolocationSample {
            latitude,
            longitude,
        }),
        _ => Err(GeolocationError::Unavailable(format!(
            "{} carries no GPS coordinates",
            path.display()
        ))),
    }
}

fn ascii_ref(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string()),
        _ => None,
    }
}

/// Degrees/minutes/seconds rationals to signed decimal degrees. South and
/// west references are negative.
fn gps_degrees(value: &Value, reference: &str) -> Option<f64> {
    let Value::Rational(parts) = value else {
        return None;
    };
    if parts.len() < 3 || parts.iter().take(3).any(|r| r.denom == 0) {
        return None;
    }
    let degrees = parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0;
    match reference {
        "S" | "W" => Some(-degrees),
        _ => Some(degrees),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exif::{experimental::Writer, Field, Rational};
    use std::io::Cursor;

    fn dms(d: u32, m: u32, s_num: u32, s_denom: u32) -> Value {
        Value::Rational(vec![
            Rational { num: d, denom: 1 },
            Rational { num: m, denom: 1 },
            Rational {
                num: s_num,
                denom: s_denom,
            },
        ])
    }

    #[test]
    fn converts_dms_to_decimal() {
        let lat = gps_degrees(&dms(12, 20, 24, 1), "N").unwrap();
        assert!((lat - 12.34).abs() < 1e-6);
    }

    #[test]
    fn southern_and_western_refs_are_negative() {
        let lon = gps_degrees(&dms(56, 46, 48, 1), "W").unwrap();
        assert!((lon + 56.78).abs() < 1e-6);
        assert!(gps_degrees(&dms(1, 0, 0, 1), "S").unwrap() < 0.0);
    }

    #[test]
    fn rejects_short_or_zero_denominator_values() {
        assert!(gps_degrees(&Value::Rational(vec![Rational { num: 1, denom: 1 }]), "N").is_none());
        assert!(gps_degrees(&dms(1, 2, 3, 0), "N").is_none());
        assert!(gps_degrees(&Value::Ascii(vec![b"N".to_vec()]), "N").is_none());
    }

    #[test]
    fn reference_is_read_from_ascii() {
        assert_eq!(ascii_ref(&Value::Ascii(vec![b"E".to_vec()])).as_deref(), Some("E"));
        assert_eq!(ascii_ref(&Value::Short(vec![1])), None);
    }

    #[tokio::test]
    async fn unsupported_provider_is_skipped() {
        let slot = SharedLocation::default();
        assert!(spawn_acquisition(NoGeolocation, slot.clone()).is_none());
        assert!(slot.lock().await.is_none());
    }

    #[tokio::test]
    async fn acquired_sample_lands_in_slot() {
        let slot = SharedLocation::default();
        let sample = GeolocationSample {
            latitude: 12.34,
            longitude: 56.78,
        };
        spawn_acquisition(FixedGeolocation(sample), slot.clone())
            .unwrap()
            .await
            .unwrap();
        assert_eq!(*slot.lock().await, Some(sample));
    }

    #[tokio::test]
    async fn photo_without_exif_leaves_slot_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-exif.jpg");
        image::RgbImage::new(4, 4).save(&path).unwrap();

        let slot = SharedLocation::default();
        spawn_acquisition(ExifGeolocation::new(&path), slot.clone())
            .unwrap()
            .await
            .unwrap();
        assert!(slot.lock().await.is_none());
    }

    fn gps_field(tag: Tag, value: Value) -> Field {
        Field {
            tag,
            ifd_num: In::PRIMARY,
            value,
        }
    }

    #[test]
    fn reads_signed_coordinates_from_gps_block() {
        let fields = [
            gps_field(Tag::GPSLatitudeRef, Value::Ascii(vec![b"N".to_vec()])),
            gps_field(Tag::GPSLatitude, dms(12, 20, 24, 1)),
            gps_field(Tag::GPSLongitudeRef, Value::Ascii(vec![b"W".to_vec()])),
            gps_field(Tag::GPSLongitude, dms(56, 46, 48, 1)),
        ];
        let mut writer = Writer::new();
        for field in &fields {
            writer.push_field(field);
        }
        let mut tiff = Cursor::new(Vec::new());
        writer.write(&mut tiff, false).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tagged.tif");
        std::fs::write(&path, tiff.into_inner()).unwrap();

        let sample = read_gps(&path).unwrap();
        assert!((sample.latitude - 12.34).abs() < 1e-6);
        assert!((sample.longitude + 56.78).abs() < 1e-6);
    }

    #[test]
    fn gps_block_without_longitude_is_unavailable() {
        let fields = [
            gps_field(Tag::GPSLatitudeRef, Value::Ascii(vec![b"S".to_vec()])),
            gps_field(Tag::GPSLatitude, dms(1, 0, 0, 1)),
        ];
        let mut writer = Writer::new();
        for field in &fields {
            writer.push_field(field);
        }
        let mut tiff = Cursor::new(Vec::new());
        writer.write(&mut tiff, true).unwrap();

        let file = tempfile::Builder::new().suffix(".tif").tempfile().unwrap();
        std::fs::write(file.path(), tiff.into_inner()).unwrap();

        assert!(matches!(
            read_gps(file.path()),
            Err(GeolocationError::Unavailable(_))
        ));
    }
}
