pub mod constants;
pub mod error;
pub mod frame;
pub mod image_codec;
pub mod region;
