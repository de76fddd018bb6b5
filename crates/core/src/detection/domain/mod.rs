pub mod detections;
pub mod detector;
pub mod face_features;
pub mod object_filter;
