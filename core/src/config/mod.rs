use serde::{Deserialize, Serialize};

use crate::color::{validate_hex_color, DEFAULT_MASK_COLOR, DEFAULT_PALETTE};
use crate::display::{DEFAULT_HEIGHT, DEFAULT_MAX_DRAW_REQUESTS, DEFAULT_WIDTH};
use crate::error::ConsoleError;
use crate::tilemap::{DEFAULT_COLUMNS, DEFAULT_ROWS, DEFAULT_TOTAL_FLAGS};

/// Hardware settings for a [`Console`](crate::Console). Missing fields take
/// their defaults, so a partial TOML or JSON table is enough.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub display_width: usize,
    pub display_height: usize,
    pub max_draw_requests: usize,
    pub sprite_pages: usize,
    pub font_pages: usize,
    pub tilemap_columns: usize,
    pub tilemap_rows: usize,
    pub total_flags: usize,
    pub colors_per_sprite: usize,
    pub palette: Vec<String>,
    pub mask_color: String,
    pub background_color: i32,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            display_width: DEFAULT_WIDTH,
            display_height: DEFAULT_HEIGHT,
            max_draw_requests: DEFAULT_MAX_DRAW_REQUESTS,
            sprite_pages: 4,
            font_pages: 2,
            tilemap_columns: DEFAULT_COLUMNS,
            tilemap_rows: DEFAULT_ROWS,
            total_flags: DEFAULT_TOTAL_FLAGS,
            colors_per_sprite: 8,
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            mask_color: DEFAULT_MASK_COLOR.to_string(),
            background_color: -1,
        }
    }
}

impl ConsoleConfig {
    pub fn from_json(json: &str) -> Result<Self, ConsoleError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the palette and mask colors. Numeric fields are clamped by
    /// the chips and never fail.
    pub fn validate(&self) -> Result<(), ConsoleError> {
        if let Some((index, value)) = self.palette.iter().enumerate().find(|(_, c)| !validate_hex_color(c)) {
            return Err(ConsoleError::InvalidColor { index: Some(index), value: value.clone() });
        }
        if !validate_hex_color(&self.mask_color) {
            return Err(ConsoleError::InvalidColor { index: None, value: self.mask_color.clone() });
        }
        Ok(())
    }
}
