//! Palette-index framebuffer to RGBA8888, for hosts that upload the frame
//! to a texture.

use crate::color::hex_to_rgb;

pub const OPAQUE_BLACK: [u8; 4] = [0, 0, 0, 0xFF];

/// RGBA lookup table for one palette state.
#[derive(Clone, Debug, Default)]
pub struct Palette {
    colors: Vec<[u8; 4]>,
    empty: [u8; 4],
}

impl Palette {
    /// Builds the table from hex colors. `empty_color` is used for the empty
    /// index -1 and for any index outside the palette. Unparseable entries
    /// become opaque black.
    pub fn from_hex(colors: &[String], empty_color: &str) -> Self {
        let rgba = |hex: &str| hex_to_rgb(hex).map_or(OPAQUE_BLACK, |[r, g, b]| [r, g, b, 0xFF]);
        Self {
            colors: colors.iter().map(|c| rgba(c)).collect(),
            empty: rgba(empty_color),
        }
    }

    pub fn len(&self) -> usize { self.colors.len() }
    pub fn is_empty(&self) -> bool { self.colors.is_empty() }

    pub fn rgba(&self, index: i32) -> [u8; 4] {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.colors.get(i))
            .copied()
            .unwrap_or(self.empty)
    }
}

/// Converts palette indices into `dst`, which is resized to four bytes per
/// pixel.
pub fn framebuffer_to_rgba(dst: &mut Vec<u8>, src: &[i32], palette: &Palette) {
    dst.resize(src.len() * 4, 0);
    for (out, &index) in dst.chunks_exact_mut(4).zip(src) {
        out.copy_from_slice(&palette.rgba(index));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette() -> Palette {
        let colors = vec!["#000000".to_string(), "#FF8000".to_string(), "nope".to_string()];
        Palette::from_hex(&colors, "#FF00FF")
    }

    #[test]
    fn indices_map_through_palette() {
        let mut dst = Vec::new();
        framebuffer_to_rgba(&mut dst, &[1, 0], &palette());
        assert_eq!(dst, vec![0xFF, 0x80, 0x00, 0xFF, 0, 0, 0, 0xFF]);
    }

    #[test]
    fn empty_and_out_of_range_use_empty_color() {
        let palette = palette();
        assert_eq!(palette.rgba(-1), [0xFF, 0x00, 0xFF, 0xFF]);
        assert_eq!(palette.rgba(40), [0xFF, 0x00, 0xFF, 0xFF]);
        assert_eq!(palette.rgba(2), OPAQUE_BLACK);
    }
}
