mod face_service;
mod http;
mod object_service;
mod payloads;
mod routes;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;

use visionx_core::annotation::domain::frame_annotator::FrameAnnotator;
use visionx_core::annotation::infrastructure::canvas_renderer::CanvasRenderer;
use visionx_core::annotation::infrastructure::font_loader::{font_candidates, load_font};
use visionx_core::capture::domain::frame_source::{CameraOpener, CameraSettings};
use visionx_core::capture::infrastructure::capture_session::CaptureSession;
use visionx_core::detection::domain::detector::Detector;
use visionx_core::detection::domain::face_features::FeatureRules;
use visionx_core::detection::domain::object_filter::{ObjectFilter, MIN_CONFIDENCE};
use visionx_core::detection::infrastructure::cascade_detector::CascadeDetector;
use visionx_core::detection::infrastructure::haar_cascade::CascadeParams;
use visionx_core::detection::infrastructure::model_resolver;
use visionx_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use visionx_core::pipeline::detect_face_features_use_case::{
    DetectFaceFeaturesUseCase, FaceDetectors,
};
use visionx_core::pipeline::detect_objects_use_case::DetectObjectsUseCase;
use visionx_core::shared::constants::{
    cascade_url, DEFAULT_FACE_PORT, DEFAULT_JPEG_QUALITY, DEFAULT_OBJECT_PORT, EYE_CASCADE_NAME,
    FACE_CASCADE_NAME, NOSE_CASCADE_CANDIDATES, NOSE_CASCADE_NAME, OBJECT_MODEL_NAME,
    SMILE_CASCADE_NAME,
};

use crate::face_service::FaceService;
use crate::object_service::ObjectService;

/// Face feature and object detection HTTP services.
#[derive(Parser)]
#[command(name = "visionx-server")]
struct Cli {
    /// Interface both services bind to.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port of the face feature service.
    #[arg(long, default_value_t = DEFAULT_FACE_PORT)]
    face_port: u16,

    /// Port of the object detection service.
    #[arg(long, default_value_t = DEFAULT_OBJECT_PORT)]
    object_port: u16,

    /// Worker threads per service.
    #[arg(long, default_value = "4")]
    workers: usize,

    /// Directory with bundled cascades and models, checked after the cache.
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Object detection model file name.
    #[arg(long, default_value = OBJECT_MODEL_NAME)]
    object_model: String,

    /// Download URL for the object model when it is not found locally.
    #[arg(long)]
    object_model_url: Option<String>,

    /// Minimum confidence of reported objects (0.0-1.0).
    #[arg(long, default_value_t = MIN_CONFIDENCE)]
    object_confidence: f64,

    /// Extra nose cascade locations, tried first (repeatable).
    #[arg(long)]
    nose_cascade: Vec<PathBuf>,

    /// Extra TrueType font for annotation text, tried first (repeatable).
    #[arg(long)]
    font: Vec<PathBuf>,

    /// Webcam device index.
    #[arg(long, default_value = "0")]
    camera_index: u32,

    /// Requested webcam resolution, WIDTHxHEIGHT.
    #[arg(long, default_value = "640x480")]
    camera_size: String,

    /// JPEG quality of returned images (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY)]
    jpeg_quality: u8,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;
    let (width, height) = parse_camera_size(&cli.camera_size)?;
    let models_dir = cli.models_dir.as_deref();

    let annotator: Arc<dyn FrameAnnotator> =
        Arc::new(CanvasRenderer::new(load_font(&font_candidates(&cli.font))));

    let face_use_case = DetectFaceFeaturesUseCase::new(
        build_face_detectors(&cli, models_dir),
        FeatureRules::default(),
        Arc::clone(&annotator),
    );
    let objects_use_case = DetectObjectsUseCase::new(
        build_object_detector(&cli, models_dir),
        ObjectFilter::default().with_min_confidence(cli.object_confidence),
        annotator,
    );
    let capture = CaptureSession::new(camera_opener(CameraSettings {
        device_index: cli.camera_index,
        width,
        height,
    }));

    let face = Arc::new(FaceService::new(face_use_case, cli.jpeg_quality));
    let object = Arc::new(ObjectService::new(objects_use_case, capture, cli.jpeg_quality));

    let mut handles = http::serve(&format!("{}:{}", cli.host, cli.face_port), cli.workers, face)?;
    handles.extend(http::serve(
        &format!("{}:{}", cli.host, cli.object_port),
        cli.workers,
        object,
    )?);

    for handle in handles {
        if handle.join().is_err() {
            log::error!("Worker thread panicked");
        }
    }
    Ok(())
}

fn build_face_detectors(cli: &Cli, models_dir: Option<&Path>) -> FaceDetectors {
    let load = |name: &str, label: &str, params: CascadeParams| -> Option<Arc<dyn Detector>> {
        let path = resolve_cascade(name, models_dir)?;
        let detector = CascadeDetector::try_load(&path, label, params)?;
        Some(Arc::new(detector))
    };

    let face = load(FACE_CASCADE_NAME, "face", CascadeParams::FACE);
    if face.is_none() {
        log::warn!("Face cascade unavailable; face requests will fail");
    }

    let mut nose_candidates = cli.nose_cascade.clone();
    if let Some(dir) = models_dir {
        nose_candidates.push(dir.join(NOSE_CASCADE_NAME));
    }
    if let Ok(cache) = model_resolver::model_cache_dir() {
        nose_candidates.push(cache.join(NOSE_CASCADE_NAME));
    }
    nose_candidates.extend(NOSE_CASCADE_CANDIDATES.iter().map(PathBuf::from));
    let nose = CascadeDetector::first_available(&nose_candidates, "nose", CascadeParams::NOSE)
        .map(|d| Arc::new(d) as Arc<dyn Detector>);

    FaceDetectors {
        face,
        eyes: load(EYE_CASCADE_NAME, "eye", CascadeParams::EYE),
        nose,
        mouth: load(SMILE_CASCADE_NAME, "mouth", CascadeParams::MOUTH),
    }
}

fn resolve_cascade(name: &str, models_dir: Option<&Path>) -> Option<PathBuf> {
    match model_resolver::resolve(name, Some(&cascade_url(name)), models_dir, None) {
        Ok(path) => Some(path),
        Err(e) => {
            log::warn!("Could not resolve {name}: {e}");
            None
        }
    }
}

fn build_object_detector(cli: &Cli, models_dir: Option<&Path>) -> Option<Arc<dyn Detector>> {
    log::info!("Resolving model: {}", cli.object_model);
    let path = match model_resolver::resolve(
        &cli.object_model,
        cli.object_model_url.as_deref(),
        models_dir,
        Some(Box::new(download_progress)),
    ) {
        Ok(path) => path,
        Err(e) => {
            log::warn!("Object model unavailable; object requests will fail: {e}");
            return None;
        }
    };
    let detector = OnnxYoloDetector::try_load(&path)?;
    Some(Arc::new(detector))
}

#[cfg(feature = "webcam")]
fn camera_opener(settings: CameraSettings) -> Arc<dyn CameraOpener> {
    use visionx_core::capture::infrastructure::nokhwa_camera::NokhwaCameraOpener;
    Arc::new(NokhwaCameraOpener::new(settings))
}

#[cfg(not(feature = "webcam"))]
fn camera_opener(_settings: CameraSettings) -> Arc<dyn CameraOpener> {
    use visionx_core::capture::infrastructure::unavailable_camera::UnavailableCamera;
    log::info!("Built without the webcam feature; live capture is disabled");
    Arc::new(UnavailableCamera)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.face_port == cli.object_port {
        return Err(format!(
            "Face and object services need distinct ports, both are {}",
            cli.face_port
        )
        .into());
    }
    if !(0.0..=1.0).contains(&cli.object_confidence) {
        return Err(format!(
            "Object confidence must be between 0.0 and 1.0, got {}",
            cli.object_confidence
        )
        .into());
    }
    if !(1..=100).contains(&cli.jpeg_quality) {
        return Err(format!("JPEG quality must be between 1 and 100, got {}", cli.jpeg_quality).into());
    }
    if cli.workers == 0 {
        return Err("Workers must be at least 1".into());
    }
    Ok(())
}

fn parse_camera_size(size: &str) -> Result<(u32, u32), Box<dyn std::error::Error>> {
    let invalid = || format!("Camera size must look like 640x480, got '{size}'");
    let (w, h) = size.split_once(['x', 'X']).ok_or_else(invalid)?;
    let width: u32 = w.trim().parse().map_err(|_| invalid())?;
    let height: u32 = h.trim().parse().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid().into());
    }
    Ok((width, height))
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading object model... {pct}%");
    } else {
        eprint!("\rDownloading object model... {downloaded} bytes");
    }
}
