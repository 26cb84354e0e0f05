//! Background tilemap.
//!
//! A grid of tiles, each pointing at a sprite plus per-cell color offset,
//! flag and flips. The chip keeps a composited pixel cache of the whole
//! map and redraws only the tiles marked invalid, the next time the cache
//! is read.

use serde::{Deserialize, Serialize};

use crate::error::ConsoleError;
use crate::pixel_data::{merge_pixels, MergeOptions, PixelData, Rect};
use crate::sprite::{SpriteChip, SPRITE_PIXELS, SPRITE_SIZE};

pub const TILE_SIZE: usize = SPRITE_SIZE;

/// Largest column or row count.
pub const MAX_TILES: usize = 256;

pub const DEFAULT_COLUMNS: usize = 32;
pub const DEFAULT_ROWS: usize = 30;
pub const DEFAULT_TOTAL_FLAGS: usize = 16;

/// One cell of the tilemap. Every setter marks the tile invalid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileData {
    index: usize,
    sprite_id: i32,
    color_offset: i32,
    flag: i32,
    flip_h: bool,
    flip_v: bool,
    invalid: bool,
}

impl TileData {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            sprite_id: -1,
            color_offset: 0,
            flag: -1,
            flip_h: false,
            flip_v: false,
            invalid: true,
        }
    }

    pub fn index(&self) -> usize { self.index }
    pub fn sprite_id(&self) -> i32 { self.sprite_id }
    pub fn color_offset(&self) -> i32 { self.color_offset }
    pub fn flag(&self) -> i32 { self.flag }
    pub fn flip_h(&self) -> bool { self.flip_h }
    pub fn flip_v(&self) -> bool { self.flip_v }
    pub fn invalid(&self) -> bool { self.invalid }

    fn set_index(&mut self, index: usize) {
        self.index = index;
        self.invalid = true;
    }

    /// -1 leaves the cell empty.
    pub fn set_sprite_id(&mut self, id: i32) {
        self.sprite_id = id;
        self.invalid = true;
    }

    pub fn set_color_offset(&mut self, offset: i32) {
        self.color_offset = offset;
        self.invalid = true;
    }

    /// Clamped to `-1..=255`.
    pub fn set_flag(&mut self, flag: i32) {
        self.flag = flag.clamp(-1, 255);
        self.invalid = true;
    }

    pub fn set_flip_h(&mut self, value: bool) {
        self.flip_h = value;
        self.invalid = true;
    }

    pub fn set_flip_v(&mut self, value: bool) {
        self.flip_v = value;
        self.invalid = true;
    }

    /// Resets everything, flips included.
    pub fn clear(&mut self) {
        self.sprite_id = -1;
        self.color_offset = 0;
        self.flag = -1;
        self.flip_h = false;
        self.flip_v = false;
        self.invalid = true;
    }

    pub fn invalidate(&mut self) {
        self.invalid = true;
    }
}

/// Persisted tilemap. Arrays are row-major (`row * columns + column`) and
/// keep the field names older save files use; the flip arrays are newer
/// and optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilemapData {
    pub columns: usize,
    pub rows: usize,
    #[serde(rename = "totalFlags", default = "default_total_flags")]
    pub total_flags: usize,
    #[serde(rename = "spriteIDs", default)]
    pub sprite_ids: Vec<i32>,
    #[serde(rename = "paletteIDs", default)]
    pub palette_ids: Vec<i32>,
    #[serde(default)]
    pub flags: Vec<i32>,
    #[serde(rename = "flipH", default, skip_serializing_if = "Vec::is_empty")]
    pub flip_h: Vec<bool>,
    #[serde(rename = "flipV", default, skip_serializing_if = "Vec::is_empty")]
    pub flip_v: Vec<bool>,
}

fn default_total_flags() -> usize {
    DEFAULT_TOTAL_FLAGS
}

fn check_len(field: &'static str, actual: usize, expected: usize) -> Result<(), ConsoleError> {
    if actual == expected {
        Ok(())
    } else {
        Err(ConsoleError::TileDataLength { field, expected, actual })
    }
}

pub struct TilemapChip {
    tiles: Vec<TileData>,
    columns: usize,
    rows: usize,
    total_flags: usize,
    cache: PixelData,
    invalid: bool,
    sprite_buf: Vec<i32>,
    tile_pixels: PixelData,
}

impl TilemapChip {
    pub fn new(columns: usize, rows: usize) -> Self {
        let mut chip = Self {
            tiles: Vec::new(),
            columns: 1,
            rows: 1,
            total_flags: DEFAULT_TOTAL_FLAGS,
            cache: PixelData::default(),
            invalid: true,
            sprite_buf: Vec::with_capacity(SPRITE_PIXELS),
            tile_pixels: PixelData::new(TILE_SIZE, TILE_SIZE),
        };
        chip.resize(columns, rows, true);
        chip
    }

    pub fn columns(&self) -> usize { self.columns }
    pub fn rows(&self) -> usize { self.rows }
    pub fn total(&self) -> usize { self.columns * self.rows }
    pub fn tiles(&self) -> &[TileData] { &self.tiles }
    pub fn is_invalid(&self) -> bool { self.invalid }

    pub fn total_flags(&self) -> usize {
        self.total_flags
    }

    pub fn set_total_flags(&mut self, value: usize) {
        self.total_flags = value.clamp(1, 256);
    }

    /// Flat index for a cell. Coordinates wrap around both edges, so -1 is
    /// the last column or row.
    pub fn tile_index(&self, column: i32, row: i32) -> usize {
        let column = column.rem_euclid(self.columns as i32) as usize;
        let row = row.rem_euclid(self.rows as i32) as usize;
        column + row * self.columns
    }

    pub fn tile(&self, column: i32, row: i32) -> &TileData {
        &self.tiles[self.tile_index(column, row)]
    }

    /// Applies `f` to one tile and marks the map for a rebuild.
    pub fn update_tile<F: FnOnce(&mut TileData)>(&mut self, column: i32, row: i32, f: F) {
        let index = self.tile_index(column, row);
        f(&mut self.tiles[index]);
        self.invalid = true;
    }

    pub fn update_tile_at(&mut self, column: i32, row: i32, sprite_id: i32, color_offset: i32, flag: i32) {
        self.update_tile(column, row, |tile| {
            tile.set_sprite_id(sprite_id);
            tile.set_color_offset(color_offset);
            tile.set_flag(flag);
        });
    }

    pub fn set_flip(&mut self, column: i32, row: i32, flip_h: bool, flip_v: bool) {
        self.update_tile(column, row, |tile| {
            tile.set_flip_h(flip_h);
            tile.set_flip_v(flip_v);
        });
    }

    pub fn flag(&self, column: i32, row: i32) -> i32 {
        self.tile(column, row).flag
    }

    /// Resizes the map (each side clamped to `1..=256`). Tiles whose flat
    /// index survives are reused; with `clear` they are fully reset. The
    /// cache is reallocated, so every tile is redrawn on the next read.
    pub fn resize(&mut self, columns: usize, rows: usize, clear: bool) {
        self.columns = columns.clamp(1, MAX_TILES);
        self.rows = rows.clamp(1, MAX_TILES);

        let total = self.total();
        self.tiles.truncate(total);
        for (i, tile) in self.tiles.iter_mut().enumerate() {
            tile.set_index(i);
            if clear {
                tile.clear();
            }
        }
        let start = self.tiles.len();
        self.tiles.extend((start..total).map(TileData::new));

        self.cache.resize_and_clear(self.columns * TILE_SIZE, self.rows * TILE_SIZE);
        self.invalid = true;

        log::debug!("tilemap resized to {}x{} (clear: {})", self.columns, self.rows, clear);
    }

    /// Forces a cache check on the next read without dirtying any tile.
    pub fn invalidate(&mut self) {
        self.invalid = true;
    }

    pub fn invalidate_all(&mut self) {
        self.tiles.iter_mut().for_each(TileData::invalidate);
        self.invalid = true;
    }

    /// Dirties every tile showing sprite `id`. Call after the sprite's pixels
    /// change so its placements are redrawn.
    pub fn invalidate_tile_id(&mut self, id: i32) {
        for tile in self.tiles.iter_mut().filter(|t| t.sprite_id == id) {
            tile.invalidate();
        }
        self.invalid = true;
    }

    pub fn clear(&mut self) {
        self.tiles.iter_mut().for_each(TileData::clear);
        self.invalid = true;
    }

    /// The composited map, `columns * 8` by `rows * 8` pixels. Rebuilds the
    /// invalid tiles first when needed.
    pub fn pixel_data(&mut self, sprites: &SpriteChip) -> &PixelData {
        if self.invalid {
            self.rebuild_cache(sprites);
        }
        &self.cache
    }

    /// The cache as it stands, without rebuilding.
    pub fn cached_pixel_data(&self) -> &PixelData {
        &self.cache
    }

    fn rebuild_cache(&mut self, sprites: &SpriteChip) {
        #[cfg(feature = "trace_tilemap")]
        log::trace!(
            "tilemap cache rebuilding {} of {} tiles",
            self.tiles.iter().filter(|t| t.invalid).count(),
            self.tiles.len()
        );

        for (i, tile) in self.tiles.iter().enumerate() {
            if !tile.invalid {
                continue;
            }

            sprites.read_sprite_at(tile.sprite_id, &mut self.sprite_buf);
            self.tile_pixels.set_pixels(&self.sprite_buf, Some(TILE_SIZE), Some(TILE_SIZE));

            let column = (i % self.columns) * TILE_SIZE;
            let row = (i / self.columns) * TILE_SIZE;

            merge_pixels(
                &self.tile_pixels,
                Rect::new(0, 0, TILE_SIZE, TILE_SIZE),
                &mut self.cache,
                column as i32,
                row as i32,
                MergeOptions {
                    flip_h: tile.flip_h,
                    flip_v: tile.flip_v,
                    color_offset: tile.color_offset,
                    mask: None,
                },
            );
        }

        self.tiles.iter_mut().for_each(|t| t.invalid = false);
        self.invalid = false;
    }

    pub fn to_data(&self) -> TilemapData {
        TilemapData {
            columns: self.columns,
            rows: self.rows,
            total_flags: self.total_flags,
            sprite_ids: self.tiles.iter().map(|t| t.sprite_id).collect(),
            palette_ids: self.tiles.iter().map(|t| t.color_offset).collect(),
            flags: self.tiles.iter().map(|t| t.flag).collect(),
            flip_h: self.tiles.iter().map(|t| t.flip_h).collect(),
            flip_v: self.tiles.iter().map(|t| t.flip_v).collect(),
        }
    }

    /// Rebuilds the map from a persisted record. Tile arrays are optional as
    /// a group; when present each must cover the whole map.
    pub fn load_data(&mut self, data: &TilemapData) -> Result<(), ConsoleError> {
        let total = data.columns.clamp(1, MAX_TILES) * data.rows.clamp(1, MAX_TILES);
        let has_tiles = !(data.sprite_ids.is_empty() && data.palette_ids.is_empty() && data.flags.is_empty());

        if has_tiles {
            check_len("spriteIDs", data.sprite_ids.len(), total)?;
            check_len("paletteIDs", data.palette_ids.len(), total)?;
            check_len("flags", data.flags.len(), total)?;
        }
        if !data.flip_h.is_empty() {
            check_len("flipH", data.flip_h.len(), total)?;
        }
        if !data.flip_v.is_empty() {
            check_len("flipV", data.flip_v.len(), total)?;
        }

        self.resize(data.columns, data.rows, true);
        self.set_total_flags(data.total_flags);

        for (i, tile) in self.tiles.iter_mut().enumerate() {
            if has_tiles {
                tile.set_sprite_id(data.sprite_ids[i]);
                tile.set_color_offset(data.palette_ids[i]);
                tile.set_flag(data.flags[i]);
            }
            tile.set_flip_h(data.flip_h.get(i).copied().unwrap_or(false));
            tile.set_flip_v(data.flip_v.get(i).copied().unwrap_or(false));
        }
        Ok(())
    }
}

impl Default for TilemapChip {
    fn default() -> Self {
        Self::new(DEFAULT_COLUMNS, DEFAULT_ROWS)
    }
}
