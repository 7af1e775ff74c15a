/// A still image sampled from a screen-capture track, encoded as base64 JPEG
pub type Base64EncodedImage = String;

/// One unencoded frame as read from a live capture track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA pixels, `width * height * 4` bytes.
    pub rgba: Vec<u8>,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self {
            width,
            height,
            rgba,
        }
    }
}
