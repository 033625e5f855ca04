//! Frame encoding for transfer to the detector

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbaImage};

use super::devices::Frame;
use super::CaptureError;

/// Encode an RGBA frame as PNG
pub fn encode_png(frame: &Frame) -> Result<Vec<u8>, CaptureError> {
    let img = RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone()).ok_or_else(|| {
        CaptureError::Encode(format!(
            "frame buffer of {} bytes does not match {}x{}",
            frame.rgba.len(),
            frame.width,
            frame.height
        ))
    })?;

    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img).write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Convert any decoded image into a frame
pub fn frame_from_image(img: DynamicImage) -> Frame {
    let rgba = img.to_rgba8();
    Frame {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32) -> Frame {
        Frame {
            width,
            height,
            rgba: [200u8, 40, 40, 255].repeat((width * height) as usize),
        }
    }

    #[test]
    fn test_encode_png_signature() {
        let png = encode_png(&solid_frame(4, 3)).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), 4);
        assert_eq!(decoded.height(), 3);
    }

    #[test]
    fn test_encode_rejects_short_buffer() {
        let frame = Frame {
            width: 10,
            height: 10,
            rgba: vec![0; 12],
        };
        assert!(matches!(encode_png(&frame), Err(CaptureError::Encode(_))));
    }

    #[test]
    fn test_frame_from_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(2, 5));
        let frame = frame_from_image(img);
        assert_eq!((frame.width, frame.height), (2, 5));
        assert_eq!(frame.rgba.len(), 40);
    }
}
