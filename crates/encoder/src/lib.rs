//! Stateless text-to-QR-image transformation.
//!
//! Identical input always yields a byte-identical PNG; there is no shared
//! state across calls, so the functions here are freely callable from
//! concurrent request handlers.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, Rgb, RgbImage};
use qrcode::{types::QrError, Color, EcLevel, QrCode};
use shared::style::{ErrorCorrection, InvalidColor, QrStyle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("text must not be empty")]
    EmptyText,
    #[error(transparent)]
    InvalidStyle(#[from] InvalidColor),
    #[error("qr symbol construction failed: {0}")]
    Qr(#[from] QrError),
    #[error("png encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

impl EncodeError {
    /// True when the caller supplied unusable input (maps to HTTP 400).
    /// Everything else is an unexpected encoder failure (HTTP 500),
    /// including text beyond the symbol capacity at the fixed
    /// error-correction level.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::EmptyText)
    }
}

/// Encodes `text` as a QR symbol and rasterizes it to a PNG of exactly
/// `style.pixel_size` squared, with `style.margin_modules` quiet-zone
/// modules on each side.
///
/// Each output pixel is mapped to the nearest module
/// (`module = floor(px / scale) - margin` with
/// `scale = pixel_size / (modules + 2 * margin)`), so the pixel dimension
/// is exact for every QR version rather than rounded to a module multiple.
pub fn encode_png(text: &str, style: &QrStyle) -> Result<Vec<u8>, EncodeError> {
    if text.is_empty() {
        return Err(EncodeError::EmptyText);
    }

    let foreground = Rgb(style.foreground_rgb()?);
    let background = Rgb(style.background_rgb()?);

    let code = QrCode::with_error_correction_level(text.as_bytes(), ec_level(style))?;
    let modules = code.width() as u32;
    let margin = style.margin_modules;
    let symbol_size = modules + 2 * margin;
    let scale = f64::from(style.pixel_size) / f64::from(symbol_size);

    let mut image = RgbImage::from_pixel(style.pixel_size, style.pixel_size, background);
    for y in 0..style.pixel_size {
        let row = (f64::from(y) / scale) as i64 - i64::from(margin);
        if row < 0 || row >= i64::from(modules) {
            continue;
        }
        for x in 0..style.pixel_size {
            let col = (f64::from(x) / scale) as i64 - i64::from(margin);
            if col < 0 || col >= i64::from(modules) {
                continue;
            }
            if code[(col as usize, row as usize)] == Color::Dark {
                image.put_pixel(x, y, foreground);
            }
        }
    }

    let mut png = Cursor::new(Vec::new());
    image.write_to(&mut png, ImageFormat::Png)?;
    Ok(png.into_inner())
}

/// As [`encode_png`], wrapped as a `data:image/png;base64,...` URL suitable
/// for direct use as an image source.
pub fn encode_data_url(text: &str, style: &QrStyle) -> Result<String, EncodeError> {
    let png = encode_png(text, style)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

fn ec_level(style: &QrStyle) -> EcLevel {
    match style.error_correction {
        ErrorCorrection::L => EcLevel::L,
        ErrorCorrection::M => EcLevel::M,
        ErrorCorrection::Q => EcLevel::Q,
        ErrorCorrection::H => EcLevel::H,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoded(text: &str) -> RgbImage {
        let png = encode_png(text, &QrStyle::default()).expect("encode");
        image::load_from_memory(&png).expect("decode png").to_rgb8()
    }

    #[test]
    fn output_has_exact_contract_dimensions() {
        let img = decoded("hello world");
        assert_eq!(img.width(), 300);
        assert_eq!(img.height(), 300);
    }

    #[test]
    fn output_uses_only_the_two_palette_colors() {
        let img = decoded("https://example.com/some/path?with=query");
        let fg = Rgb([0x05, 0x96, 0x69]);
        let bg = Rgb([0xff, 0xff, 0xff]);

        let mut saw_fg = false;
        let mut saw_bg = false;
        for pixel in img.pixels() {
            assert!(*pixel == fg || *pixel == bg, "off-palette pixel {pixel:?}");
            saw_fg |= *pixel == fg;
            saw_bg |= *pixel == bg;
        }
        assert!(saw_fg, "no foreground modules rendered");
        assert!(saw_bg, "no background rendered");
    }

    #[test]
    fn quiet_zone_corners_are_background() {
        let img = decoded("hello");
        let bg = Rgb([0xff, 0xff, 0xff]);
        for (x, y) in [(0, 0), (299, 0), (0, 299), (299, 299)] {
            assert_eq!(*img.get_pixel(x, y), bg, "corner ({x},{y}) not background");
        }
    }

    #[test]
    fn identical_input_yields_byte_identical_png() {
        let style = QrStyle::default();
        let first = encode_png("deterministic", &style).expect("first");
        let second = encode_png("deterministic", &style).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn distinct_inputs_yield_distinct_images() {
        let style = QrStyle::default();
        let a = encode_png("abc", &style).expect("abc");
        let b = encode_png("abd", &style).expect("abd");
        assert_ne!(a, b);
    }

    #[test]
    fn data_url_carries_png_mime_prefix() {
        let url = encode_data_url("hello", &QrStyle::default()).expect("encode");
        let payload = url
            .strip_prefix("data:image/png;base64,")
            .expect("data url prefix");
        let png = STANDARD.decode(payload).expect("valid base64");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn empty_text_is_classified_as_invalid_input() {
        let err = encode_png("", &QrStyle::default()).expect_err("must reject");
        assert!(matches!(err, EncodeError::EmptyText));
        assert!(err.is_invalid_input());
    }

    #[test]
    fn whitespace_text_still_encodes() {
        // The service contract only rejects the empty string; skipping
        // whitespace-only input is the controller's job.
        encode_png("   ", &QrStyle::default()).expect("whitespace encodes");
    }

    #[test]
    fn over_capacity_text_is_a_server_side_failure() {
        // Byte-mode capacity at EC level M tops out at 2331 bytes.
        let text = "x".repeat(3000);
        let err = encode_png(&text, &QrStyle::default()).expect_err("must fail");
        assert!(matches!(err, EncodeError::Qr(_)));
        assert!(!err.is_invalid_input());
    }

    #[test]
    fn malformed_style_color_is_reported() {
        let style = QrStyle {
            foreground: "emerald".to_string(),
            ..QrStyle::default()
        };
        let err = encode_png("hello", &style).expect_err("must reject color");
        assert!(matches!(err, EncodeError::InvalidStyle(_)));
    }
}
