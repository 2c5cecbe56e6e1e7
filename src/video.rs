//! MJPEG producer for `/video_feed`.
//!
//! Every viewer gets its own producer instance that grabs, encodes and wraps
//! frames on the blocking pool. Nothing is shared between viewers; two
//! viewers means two independent grab loops against the same device.

use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::{self, Stream};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::device::CameraDevice;
use crate::error::{BridgeError, BridgeResult};
use crate::types::{PixelFormat, RawFrame};

pub const MULTIPART_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

pub trait FrameEncoder: Send + Sync {
    fn mime_type(&self) -> &'static str;
    fn encode(&self, frame: &RawFrame) -> BridgeResult<Vec<u8>>;
}

pub struct JpegFrameEncoder {
    quality: u8,
}

impl JpegFrameEncoder {
    pub fn new(quality: u8) -> Self {
        Self { quality: quality.clamp(1, 100) }
    }
}

impl Default for JpegFrameEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl FrameEncoder for JpegFrameEncoder {
    fn mime_type(&self) -> &'static str {
        "image/jpeg"
    }

    fn encode(&self, frame: &RawFrame) -> BridgeResult<Vec<u8>> {
        if frame.data.len() != frame.expected_len() {
            return Err(BridgeError::Encode(format!(
                "{}x{} {:?} frame has {} bytes, expected {}",
                frame.width,
                frame.height,
                frame.format,
                frame.data.len(),
                frame.expected_len()
            )));
        }

        // JPEG has no alpha channel; BGRA is reordered to RGB
        let (pixels, color) = match frame.format {
            PixelFormat::Gray8 => (frame.data.clone(), ExtendedColorType::L8),
            PixelFormat::Rgb8 => (frame.data.clone(), ExtendedColorType::Rgb8),
            PixelFormat::Bgra8 => {
                let rgb = frame
                    .data
                    .chunks_exact(4)
                    .flat_map(|px| [px[2], px[1], px[0]])
                    .collect();
                (rgb, ExtendedColorType::Rgb8)
            }
        };

        let mut out = Vec::with_capacity(pixels.len() / 8);
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut out, self.quality);
            encoder
                .encode(&pixels, frame.width, frame.height, color)
                .map_err(|e| BridgeError::Encode(e.to_string()))?;
        }
        Ok(out)
    }
}

/// Wrap one encoded image in the `frame` multipart boundary.
pub fn frame_envelope(mime: &str, payload: &[u8]) -> Bytes {
    let header = format!("--frame\r\nContent-Type: {}\r\n\r\n", mime);
    let mut buf = BytesMut::with_capacity(header.len() + payload.len() + 2);
    buf.put_slice(header.as_bytes());
    buf.put_slice(payload);
    buf.put_slice(b"\r\n");
    buf.freeze()
}

#[derive(Clone)]
pub struct VideoStreamProducer {
    device: Arc<dyn CameraDevice>,
    encoder: Arc<dyn FrameEncoder>,
}

impl VideoStreamProducer {
    pub fn new(device: Arc<dyn CameraDevice>, encoder: Arc<dyn FrameEncoder>) -> Self {
        Self { device, encoder }
    }

    /// Grab, encode and wrap a single frame. Blocking.
    pub fn next_chunk(&self) -> Option<Bytes> {
        let frame = match self.device.grab_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::trace!("[VIDEO] grab skipped: {}", e);
                return None;
            }
        };
        match self.encoder.encode(&frame) {
            Ok(jpeg) => Some(frame_envelope(self.encoder.mime_type(), &jpeg)),
            Err(e) => {
                log::trace!("[VIDEO] encode skipped: {}", e);
                None
            }
        }
    }

    /// Endless chunk stream for one viewer. Failed grabs are retried on the
    /// next iteration; the stream only ends when `cancel` fires.
    pub fn stream(self, cancel: CancellationToken) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        stream::unfold((self, cancel), |(producer, cancel)| async move {
            loop {
                if cancel.is_cancelled() {
                    return None;
                }
                let worker = producer.clone();
                let grabbed = tokio::select! {
                    _ = cancel.cancelled() => return None,
                    joined = tokio::task::spawn_blocking(move || worker.next_chunk()) => joined,
                };
                match grabbed {
                    Ok(Some(chunk)) => return Some((Ok(chunk), (producer, cancel))),
                    Ok(None) => continue,
                    Err(e) => {
                        log::warn!("[VIDEO] grab task failed: {}", e);
                        continue;
                    }
                }
            }
        })
    }
}
