use std::sync::Arc;

use crate::pipeline::detect_objects_use_case::DetectObjectsUseCase;
use crate::shared::constants::STREAM_BOUNDARY;
use crate::shared::error::VisionError;
use crate::shared::frame::Frame;
use crate::shared::image_codec::encode_jpeg;

/// `Content-Type` of the live feed.
pub fn stream_content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={STREAM_BOUNDARY}")
}

/// One part of the live feed wrapping a JPEG.
pub fn multipart_part(jpeg: &[u8]) -> Vec<u8> {
    let header = format!("--{STREAM_BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n");
    let mut part = Vec::with_capacity(header.len() + jpeg.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    part
}

/// Live feed: mirror → object pipeline → JPEG → multipart part.
pub struct StreamObjectsUseCase {
    objects: Arc<DetectObjectsUseCase>,
    jpeg_quality: u8,
}

impl StreamObjectsUseCase {
    pub fn new(objects: Arc<DetectObjectsUseCase>, jpeg_quality: u8) -> Self {
        Self {
            objects,
            jpeg_quality,
        }
    }

    pub fn render_part(&self, frame: &Frame) -> Result<Vec<u8>, VisionError> {
        let outcome = self.objects.execute(frame.mirrored())?;
        let jpeg = encode_jpeg(&outcome.image, self.jpeg_quality)?;
        Ok(multipart_part(&jpeg))
    }

    /// Parts for `frames` until the source ends or a frame fails.
    pub fn parts<'a, I>(&'a self, frames: I) -> impl Iterator<Item = Vec<u8>> + 'a
    where
        I: IntoIterator<Item = Frame>,
        I::IntoIter: 'a,
    {
        frames
            .into_iter()
            .map(move |frame| self.render_part(&frame))
            .map_while(|part| match part {
                Ok(part) => Some(part),
                Err(e) => {
                    log::warn!("Ending video feed: {e}");
                    None
                }
            })
    }
}
