pub mod capture_session;
#[cfg(feature = "webcam")]
pub mod nokhwa_camera;
pub mod unavailable_camera;
