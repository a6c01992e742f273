use serde::{Deserialize, Serialize};
use thiserror::Error;

/// QR symbol error-correction strength. `M` recovers roughly 15% damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCorrection {
    L,
    M,
    Q,
    H,
}

/// Fixed visual parameters of every generated image, plus the controller's
/// debounce interval. These are deliberately not user-configurable; the
/// defaults are the wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrStyle {
    pub pixel_size: u32,
    pub margin_modules: u32,
    pub foreground: String,
    pub background: String,
    pub error_correction: ErrorCorrection,
    pub debounce_ms: u64,
}

impl Default for QrStyle {
    fn default() -> Self {
        Self {
            pixel_size: 300,
            margin_modules: 2,
            foreground: "#059669".to_string(),
            background: "#ffffff".to_string(),
            error_correction: ErrorCorrection::M,
            debounce_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid hex color '{0}', expected #RRGGBB")]
pub struct InvalidColor(pub String);

impl QrStyle {
    pub fn foreground_rgb(&self) -> Result<[u8; 3], InvalidColor> {
        parse_hex_color(&self.foreground)
    }

    pub fn background_rgb(&self) -> Result<[u8; 3], InvalidColor> {
        parse_hex_color(&self.background)
    }
}

fn parse_hex_color(raw: &str) -> Result<[u8; 3], InvalidColor> {
    let hex = raw
        .strip_prefix('#')
        .ok_or_else(|| InvalidColor(raw.to_string()))?;
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(InvalidColor(raw.to_string()));
    }

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|_| InvalidColor(raw.to_string()))
    };

    Ok([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_style_matches_contract() {
        let style = QrStyle::default();
        assert_eq!(style.pixel_size, 300);
        assert_eq!(style.margin_modules, 2);
        assert_eq!(style.foreground, "#059669");
        assert_eq!(style.background, "#ffffff");
        assert_eq!(style.error_correction, ErrorCorrection::M);
        assert_eq!(style.debounce_ms, 500);
    }

    #[test]
    fn parses_contract_colors() {
        let style = QrStyle::default();
        assert_eq!(style.foreground_rgb().expect("fg"), [0x05, 0x96, 0x69]);
        assert_eq!(style.background_rgb().expect("bg"), [0xff, 0xff, 0xff]);
    }

    #[test]
    fn rejects_malformed_colors() {
        for raw in ["059669", "#05966", "#05966g", "#", "emerald"] {
            assert!(parse_hex_color(raw).is_err(), "accepted {raw}");
        }
    }
}
