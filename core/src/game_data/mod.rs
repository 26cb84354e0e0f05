//! Aggregate save document: palette, sprites, tilemap and fonts in one
//! JSON object. Every section is optional so partial files load.

use serde::{Deserialize, Serialize};

use crate::color::ColorData;
use crate::error::ConsoleError;
use crate::font::FontData;
use crate::sprite::SpriteData;
use crate::tilemap::TilemapData;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<ColorData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprites: Option<SpriteData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tilemap: Option<TilemapData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fonts: Option<FontData>,
}

impl GameData {
    pub fn from_json(json: &str) -> Result<Self, ConsoleError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConsoleError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_are_optional() {
        let data = GameData::from_json(r#"{"tilemap": {"columns": 2, "rows": 1}}"#).unwrap();
        assert!(data.colors.is_none());
        assert!(data.sprites.is_none());
        assert_eq!(data.tilemap.as_ref().map(|t| t.columns), Some(2));
        assert_eq!(data.tilemap.as_ref().map(|t| t.total_flags), Some(16));

        let json = data.to_json().unwrap();
        assert!(!json.contains("colors"));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(GameData::from_json("{"), Err(ConsoleError::Json(_))));
    }
}
