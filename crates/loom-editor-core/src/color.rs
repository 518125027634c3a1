//! Colour helpers for presence decorations.
//!
//! Colours are packed as `0xRRGGBBAA`.

/// Convert a packed colour to a CSS `rgba()` string.
pub fn rgba_u32_to_css(color: u32) -> String {
    let (r, g, b, a) = unpack(color);
    format!("rgba({}, {}, {}, {})", r, g, b, a as f32 / 255.0)
}

/// Same colour with `alpha` in place of its own alpha channel.
///
/// Selection bodies use a translucent version of the participant colour so
/// the text underneath stays readable.
pub fn rgba_u32_to_css_alpha(color: u32, alpha: f32) -> String {
    let (r, g, b, _) = unpack(color);
    format!("rgba({}, {}, {}, {})", r, g, b, alpha)
}

/// `#rrggbb`, alpha dropped.
pub fn rgba_u32_to_hex(color: u32) -> String {
    format!("#{:06x}", color >> 8)
}

fn unpack(color: u32) -> (u32, u32, u32, u32) {
    (
        (color >> 24) & 0xFF,
        (color >> 16) & 0xFF,
        (color >> 8) & 0xFF,
        color & 0xFF,
    )
}
