use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use nurdle_client_rs::{
    camera::{MediaProvider, NoCamera, StillFrameCamera},
    geolocation::{
        ExifGeolocation, FixedGeolocation, GeolocationProvider, GeolocationSample, NoGeolocation,
    },
    payload::FormData,
    utils::get_env,
    view::TerminalView,
    Controller, UploadClient,
};

#[derive(Parser)]
#[command(about = "Send photos to a nurdle detection server")]
struct Cli {
    /// Server base URL, overrides NURDLE_SERVER_URL
    #[arg(long, global = true)]
    server: Option<String>,

    /// Write the annotated image returned by the server here
    #[arg(long, short, global = true)]
    output: Option<PathBuf>,

    #[command(flatten)]
    location: LocationArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct LocationArgs {
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat: Option<f64>,

    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,

    /// Take the location from the GPS tags of the uploaded photo
    #[arg(long, conflicts_with_all = ["lat", "lon"])]
    exif_location: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Upload an image file
    Upload {
        path: PathBuf,

        #[arg(long, default_value = "image")]
        field_name: String,
    },
    /// Open a camera over a still frame, capture it and upload the snapshot
    Capture {
        #[arg(long)]
        frame: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = get_env()?;
    if let Some(server) = cli.server {
        config.server_url = server.trim_end_matches('/').to_string();
    }
    info!("Using detection server at {}", config.server_url);

    let client = UploadClient::new(&config.server_url, config.upload_limit_bytes);
    let view = TerminalView::new(cli.output);
    let location = cli.location;

    match cli.command {
        Command::Upload { path, field_name } => {
            let camera = NoCamera;
            let form = FormData::from_file(&field_name, &path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let mut controller = if location.exif_location {
                start(client, camera, view, ExifGeolocation::new(&path)).await
            } else {
                start_with(client, camera, view, &location).await
            };
            controller.submit_form(form).await?;
        }
        Command::Capture { frame } => {
            let camera = StillFrameCamera::new(&frame);
            let mut controller = if location.exif_location {
                start(client, camera, view, ExifGeolocation::new(&frame)).await
            } else {
                start_with(client, camera, view, &location).await
            };
            controller.open_camera().await?;
            if controller.capture().await?.is_none() {
                bail!("camera closed before a frame was captured");
            }
        }
    }

    Ok(())
}

async fn start<M: MediaProvider, G: GeolocationProvider>(
    client: UploadClient,
    camera: M,
    view: TerminalView,
    geolocation: G,
) -> Controller<M, TerminalView> {
    let mut controller = Controller::new(client, camera, view, geolocation);
    // A one-shot command has nothing else to do while the location settles.
    controller.wait_for_location().await;
    controller
}

async fn start_with<M: MediaProvider>(
    client: UploadClient,
    camera: M,
    view: TerminalView,
    location: &LocationArgs,
) -> Controller<M, TerminalView> {
    match (location.lat, location.lon) {
        (Some(latitude), Some(longitude)) => {
            let sample = GeolocationSample {
                latitude,
                longitude,
            };
            start(client, camera, view, FixedGeolocation(sample)).await
        }
        _ => start(client, camera, view, NoGeolocation).await,
    }
}
