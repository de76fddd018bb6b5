const OPENCV_CASCADE_BASE_URL: &str =
    "https://raw.githubusercontent.com/opencv/opencv/4.x/data/haarcascades";

pub const FACE_CASCADE_NAME: &str = "haarcascade_frontalface_default.xml";
pub const EYE_CASCADE_NAME: &str = "haarcascade_eye.xml";
pub const SMILE_CASCADE_NAME: &str = "haarcascade_smile.xml";
/// Not shipped with current OpenCV releases; only probed locally.
pub const NOSE_CASCADE_NAME: &str = "haarcascade_mcs_nose.xml";

/// Extra places a nose cascade is commonly installed.
pub const NOSE_CASCADE_CANDIDATES: &[&str] = &[
    "haarcascade_mcs_nose.xml",
    "/usr/share/opencv4/haarcascades/haarcascade_mcs_nose.xml",
    "/usr/share/opencv/haarcascades/haarcascade_mcs_nose.xml",
];

pub fn cascade_url(name: &str) -> String {
    format!("{OPENCV_CASCADE_BASE_URL}/{name}")
}

pub const OBJECT_MODEL_NAME: &str = "yolov8n.onnx";

/// Uploaded images are resized to this width before face detection.
pub const FACE_INPUT_WIDTH: u32 = 640;

pub const DEFAULT_JPEG_QUALITY: u8 = 95;

pub const DEFAULT_FACE_PORT: u16 = 8000;
pub const DEFAULT_OBJECT_PORT: u16 = 8001;

pub const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Boundary marker between parts of the MJPEG video feed.
pub const STREAM_BOUNDARY: &str = "frame";
