//! Errors for the fallible edges of the console: loading and saving
//! persisted chip data. The per-frame API clamps or ignores bad input
//! instead of failing.

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("malformed game data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("tilemap field `{field}` holds {actual} entries, expected {expected}")]
    TileDataLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("sprite {index} holds {actual} pixels, expected {expected}")]
    SpriteDataLength {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("invalid hex color {value:?} (slot {index:?})")]
    InvalidColor { index: Option<usize>, value: String },
}
