pub mod detect_face_features_use_case;
pub mod detect_objects_use_case;
pub mod stream_objects_use_case;
