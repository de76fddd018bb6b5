pub mod cascade_detector;
pub mod cascade_loader;
pub mod haar_cascade;
pub mod integral_image;
pub mod math;
pub mod model_resolver;
pub mod onnx_yolo_detector;
