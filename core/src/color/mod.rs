//! Palette memory.
//!
//! The color chip maps palette indices to `#RRGGBB` strings. Everything
//! else in the console works in indices; only the runner turns them into
//! real colors, re-caching its RGB table whenever [`ColorChip::invalid`] is
//! set and then calling [`ColorChip::reset_validation`].

use serde::{Deserialize, Serialize};

use crate::error::ConsoleError;

pub const DEFAULT_MASK_COLOR: &str = "#FF00FF";

/// Smallest palette the chip will shrink to.
pub const MIN_COLORS: usize = 2;

pub const DEFAULT_PALETTE: [&str; 16] = [
    "#2D1B2E", "#218A91", "#3CC2FA", "#9AF6FD", "#4A247C", "#574B67", "#937AC5", "#8AE25D",
    "#8E2B45", "#F04156", "#F272CE", "#D3C0A8", "#C5754A", "#F2A759", "#F7DB53", "#F9F4EA",
];

/// Matches `#RGB` and `#RRGGBB`, either case.
pub fn validate_hex_color(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

/// Parses a validated hex color into its RGB channels.
pub fn hex_to_rgb(value: &str) -> Option<[u8; 3]> {
    if !validate_hex_color(value) {
        return None;
    }

    let digits = &value[1..];
    let channel = |i: usize| -> Option<u8> {
        if digits.len() == 3 {
            let v = u8::from_str_radix(&digits[i..i + 1], 16).ok()?;
            Some(v << 4 | v)
        } else {
            u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16).ok()
        }
    };

    Some([channel(0)?, channel(1)?, channel(2)?])
}

/// Persisted palette record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorData {
    pub colors: Vec<String>,
    #[serde(default = "no_background")]
    pub background_color: i32,
    #[serde(default = "default_mask")]
    pub mask_color: String,
}

fn no_background() -> i32 {
    -1
}

fn default_mask() -> String {
    DEFAULT_MASK_COLOR.to_string()
}

pub struct ColorChip {
    colors: Vec<String>,
    background_color: i32,
    mask_color: String,
    debug_mode: bool,
    invalid: bool,
}

impl ColorChip {
    pub fn new() -> Self {
        Self {
            colors: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            background_color: -1,
            mask_color: DEFAULT_MASK_COLOR.to_string(),
            debug_mode: false,
            invalid: true,
        }
    }

    /// Number of palette slots.
    pub fn total(&self) -> usize {
        self.colors.len()
    }

    /// Resizes the palette. New slots hold the mask color; shrinking drops
    /// the tail. A background index that no longer fits becomes -1.
    pub fn set_total(&mut self, total: usize) {
        let total = total.max(MIN_COLORS);
        let mask = self.mask_color.clone();
        self.colors.resize(total, mask);

        if self.background_color >= total as i32 {
            self.background_color = -1;
        }

        log::debug!("palette resized to {} colors", total);
        self.invalidate();
    }

    /// Read-only view of the palette.
    pub fn hex_colors(&self) -> &[String] {
        &self.colors
    }

    /// The color at `index`, or the mask color when the index is out of range.
    pub fn read_color_at(&self, index: i32) -> &str {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.colors.get(i))
            .map_or(self.mask_color.as_str(), |c| c.as_str())
    }

    /// Writes one slot. Out-of-range indices, invalid hex strings and
    /// unchanged values are ignored; returns whether the palette changed.
    pub fn update_color_at(&mut self, index: usize, color: &str) -> bool {
        if index >= self.colors.len() {
            return false;
        }

        let color = color.to_ascii_uppercase();
        if !validate_hex_color(&color) || self.colors[index] == color {
            return false;
        }

        self.colors[index] = color;
        self.invalidate();
        true
    }

    /// Sets every slot to `color`, or to the mask color when `None`.
    pub fn clear(&mut self, color: Option<&str>) {
        let color = color.unwrap_or(self.mask_color.as_str()).to_string();
        for i in 0..self.colors.len() {
            self.update_color_at(i, &color);
        }
    }

    pub fn background_color(&self) -> i32 {
        self.background_color
    }

    /// Anything outside `[-1, total)` means "no background".
    pub fn set_background_color(&mut self, index: i32) {
        self.background_color = if (-1..self.colors.len() as i32).contains(&index) {
            index
        } else {
            -1
        };
        self.invalidate();
    }

    pub fn mask_color(&self) -> &str {
        &self.mask_color
    }

    pub fn set_mask_color(&mut self, color: &str) -> bool {
        let color = color.to_ascii_uppercase();
        if !validate_hex_color(&color) {
            return false;
        }
        if self.mask_color != color {
            self.mask_color = color;
            self.invalidate();
        }
        true
    }

    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    /// When on, runners show the mask color for empty pixels instead of the
    /// background color.
    pub fn set_debug_mode(&mut self, value: bool) {
        self.debug_mode = value;
        self.invalidate();
    }

    /// Slots holding something other than the mask color.
    pub fn total_used_colors(&self) -> usize {
        self.colors.iter().filter(|c| **c != self.mask_color).count()
    }

    pub fn invalid(&self) -> bool {
        self.invalid
    }

    pub fn invalidate(&mut self) {
        self.invalid = true;
    }

    pub fn reset_validation(&mut self) {
        self.invalid = false;
    }

    pub fn to_data(&self) -> ColorData {
        ColorData {
            colors: self.colors.clone(),
            background_color: self.background_color,
            mask_color: self.mask_color.clone(),
        }
    }

    /// Replaces the palette from a persisted record. The record is checked
    /// up front so a bad entry leaves the chip untouched.
    pub fn load_data(&mut self, data: &ColorData) -> Result<(), ConsoleError> {
        if !validate_hex_color(&data.mask_color) {
            return Err(ConsoleError::InvalidColor { index: None, value: data.mask_color.clone() });
        }
        if let Some((index, value)) = data.colors.iter().enumerate().find(|(_, c)| !validate_hex_color(c)) {
            return Err(ConsoleError::InvalidColor { index: Some(index), value: value.clone() });
        }

        self.set_mask_color(&data.mask_color);
        self.set_total(data.colors.len());
        for (i, color) in data.colors.iter().enumerate() {
            self.update_color_at(i, color);
        }
        self.set_background_color(data.background_color);
        Ok(())
    }
}

impl Default for ColorChip {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_resize_fills_with_mask_color() {
        let mut chip = ColorChip::new();
        for n in [2usize, 5, 16, 40, 3] {
            chip.set_total(n);
            assert_eq!(chip.hex_colors().len(), n);
        }

        let mut chip = ColorChip::new();
        chip.set_total(20);
        assert!(chip.hex_colors()[16..].iter().all(|c| c == DEFAULT_MASK_COLOR));
        assert_eq!(chip.hex_colors()[15], "#F9F4EA");
    }

    #[test]
    fn palette_never_shrinks_below_two() {
        let mut chip = ColorChip::new();
        chip.set_total(0);
        assert_eq!(chip.total(), MIN_COLORS);
    }

    #[test]
    fn hex_validation() {
        assert!(validate_hex_color("#fff"));
        assert!(validate_hex_color("#00aAfF"));
        assert!(!validate_hex_color("fff"));
        assert!(!validate_hex_color("#ffff"));
        assert!(!validate_hex_color("#gggggg"));
        assert!(!validate_hex_color("#ÿÿÿ"));
    }

    #[test]
    fn update_color_uppercases_and_rejects_bad_input() {
        let mut chip = ColorChip::new();
        chip.reset_validation();

        assert!(!chip.update_color_at(0, "not a color"));
        assert!(!chip.update_color_at(99, "#000000"));
        assert!(!chip.invalid());

        assert!(chip.update_color_at(0, "#abcdef"));
        assert_eq!(chip.read_color_at(0), "#ABCDEF");
        assert!(chip.invalid());

        chip.reset_validation();
        assert!(!chip.update_color_at(0, "#ABCDEF"));
        assert!(!chip.invalid());
    }

    #[test]
    fn out_of_range_reads_return_mask() {
        let chip = ColorChip::new();
        assert_eq!(chip.read_color_at(-1), DEFAULT_MASK_COLOR);
        assert_eq!(chip.read_color_at(16), DEFAULT_MASK_COLOR);
    }

    #[test]
    fn background_outside_range_becomes_none() {
        let mut chip = ColorChip::new();
        chip.set_background_color(3);
        assert_eq!(chip.background_color(), 3);
        chip.set_background_color(16);
        assert_eq!(chip.background_color(), -1);
        chip.set_background_color(-7);
        assert_eq!(chip.background_color(), -1);

        chip.set_background_color(10);
        chip.set_total(4);
        assert_eq!(chip.background_color(), -1);
    }

    #[test]
    fn used_colors_ignores_mask_slots() {
        let mut chip = ColorChip::new();
        chip.set_total(20);
        assert_eq!(chip.total_used_colors(), 16);
        chip.clear(None);
        assert_eq!(chip.total_used_colors(), 0);
    }

    #[test]
    fn rgb_parsing() {
        assert_eq!(hex_to_rgb("#FF8000"), Some([255, 128, 0]));
        assert_eq!(hex_to_rgb("#f80"), Some([255, 136, 0]));
        assert_eq!(hex_to_rgb("FF8000"), None);
    }

    #[test]
    fn load_data_rejects_invalid_entries_without_mutation() {
        let mut chip = ColorChip::new();
        let data = ColorData {
            colors: vec!["#000000".into(), "oops".into()],
            background_color: 0,
            mask_color: DEFAULT_MASK_COLOR.into(),
        };

        assert!(matches!(
            chip.load_data(&data),
            Err(ConsoleError::InvalidColor { index: Some(1), .. })
        ));
        assert_eq!(chip.total(), 16);
    }

    #[test]
    fn data_round_trip() {
        let mut chip = ColorChip::new();
        chip.set_total(4);
        chip.set_background_color(2);
        let data = chip.to_data();

        let mut other = ColorChip::new();
        other.load_data(&data).unwrap();
        assert_eq!(other.hex_colors(), chip.hex_colors());
        assert_eq!(other.background_color(), 2);
    }
}
