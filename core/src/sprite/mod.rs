//! Sprite memory.
//!
//! Sprites are 8x8 cells packed into a paged atlas, 128x128 pixels per
//! page. Next to the atlas the chip keeps a per-cell copy of what was last
//! written, which backs duplicate lookups and emptiness checks without
//! rereading the atlas.

mod image_data;

use serde::{Deserialize, Serialize};

pub use image_data::ImageData;

use crate::error::ConsoleError;
use crate::pixel_data::{PixelData, PixelSource, EMPTY};

pub const SPRITE_SIZE: usize = 8;
pub const SPRITE_PIXELS: usize = SPRITE_SIZE * SPRITE_SIZE;
pub const PAGE_WIDTH: usize = 128;
pub const PAGE_HEIGHT: usize = 128;
pub const MAX_PAGES: usize = 8;

const EMPTY_SPRITE: [i32; SPRITE_PIXELS] = [EMPTY; SPRITE_PIXELS];

/// Persisted sprite memory: only non-empty cells are stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteData {
    pub pages: usize,
    pub sprites: Vec<SpriteEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteEntry {
    pub id: usize,
    pub pixels: Vec<i32>,
}

pub struct SpriteChip {
    atlas: ImageData,
    cache: Vec<Option<Box<[i32]>>>,
    pages: usize,
    colors_per_sprite: usize,
    unique: bool,
    generation: u64,
}

impl SpriteChip {
    pub fn new(pages: usize) -> Self {
        let pages = pages.clamp(1, MAX_PAGES);
        let atlas = ImageData::new(PAGE_WIDTH, PAGE_HEIGHT * pages);
        let cache = vec![None; atlas.total_sprites()];

        Self {
            atlas,
            cache,
            pages,
            colors_per_sprite: 8,
            unique: false,
            generation: 0,
        }
    }

    /// True when every pixel is empty.
    pub fn is_empty(data: &[i32]) -> bool {
        data.iter().all(|&p| p <= EMPTY)
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Changes the number of pages (clamped to `1..=8`). Sprites whose id
    /// still fits are kept along with their cache entries; the cache
    /// generation is bumped either way so lookups made against the old
    /// layout can be told apart.
    pub fn set_pages(&mut self, pages: usize) {
        let pages = pages.clamp(1, MAX_PAGES);
        if pages == self.pages {
            return;
        }

        self.pages = pages;
        self.atlas.resize_preserving(PAGE_WIDTH, PAGE_HEIGHT * pages);
        self.cache.resize(self.atlas.total_sprites(), None);
        self.generation += 1;

        log::debug!(
            "sprite memory resized to {} pages ({} sprites, generation {})",
            pages,
            self.total_sprites(),
            self.generation
        );
    }

    /// Bumped by every change that reshapes or wipes the cache.
    pub fn cache_generation(&self) -> u64 {
        self.generation
    }

    pub fn total_sprites(&self) -> usize {
        self.atlas.total_sprites()
    }

    /// Number of cells holding a non-empty sprite.
    pub fn sprites_in_memory(&self) -> usize {
        self.cache.iter().filter(|c| c.is_some()).count()
    }

    pub fn colors_per_sprite(&self) -> usize {
        self.colors_per_sprite
    }

    pub fn set_colors_per_sprite(&mut self, value: usize) {
        self.colors_per_sprite = value.clamp(1, 16);
    }

    pub fn unique(&self) -> bool {
        self.unique
    }

    pub fn set_unique(&mut self, value: bool) {
        self.unique = value;
    }

    pub fn columns(&self) -> usize { self.atlas.columns() }
    pub fn texture_width(&self) -> usize { self.atlas.width() }
    pub fn texture_height(&self) -> usize { self.atlas.height() }

    /// Read-only view of the whole atlas.
    pub fn pixel_data(&self) -> &PixelData {
        self.atlas.pixel_data()
    }

    pub fn clear(&mut self) {
        self.atlas.clear();
        self.cache.fill(None);
        self.generation += 1;
    }

    /// Fills `buf` with sprite `index`. Index -1, or any index past the end of
    /// memory, yields the empty sprite. `buf` is resized to one cell.
    pub fn read_sprite_at(&self, index: i32, buf: &mut Vec<i32>) {
        match usize::try_from(index) {
            Ok(id) if id < self.total_sprites() => {
                self.atlas.read_sprite_into(id, Some(self.colors_per_sprite), buf);
            }
            _ => {
                buf.clear();
                buf.extend_from_slice(&EMPTY_SPRITE);
            }
        }
    }

    /// Writes a sprite and records its signature for later lookups. Blocks
    /// that are not exactly one cell, and ids outside memory, are ignored.
    pub fn update_sprite_at(&mut self, index: usize, pixels: &[i32]) -> bool {
        if !self.atlas.write_sprite(index, pixels) {
            return false;
        }

        #[cfg(feature = "trace_sprites")]
        log::trace!("sprite {} updated", index);

        self.cache[index] = (!Self::is_empty(pixels)).then(|| pixels.into());
        true
    }

    /// Lowest sprite id holding exactly `pixels`. With `empty_check`, an
    /// empty block returns `None` without scanning.
    pub fn find_sprite(&self, pixels: &[i32], empty_check: bool) -> Option<usize> {
        if empty_check && Self::is_empty(pixels) {
            return None;
        }
        self.cache.iter().position(|c| c.as_deref() == Some(pixels))
    }

    /// True for cells that were never written or only hold empty pixels.
    /// Ids outside memory count as empty.
    pub fn is_empty_at(&self, index: usize) -> bool {
        self.cache.get(index).is_none_or(|c| c.is_none())
    }

    /// First cell without a sprite, used by importers looking for a free slot.
    pub fn next_empty_id(&self) -> Option<usize> {
        self.cache.iter().position(|c| c.is_none())
    }

    /// Stores a sprite in the next free cell. When the chip is `unique`, an
    /// identical sprite already in memory is reused instead.
    pub fn add_sprite(&mut self, pixels: &[i32]) -> Option<usize> {
        if pixels.len() != SPRITE_PIXELS {
            return None;
        }

        if self.unique {
            if let Some(id) = self.find_sprite(pixels, true) {
                return Some(id);
            }
        }

        let id = self.next_empty_id()?;
        self.update_sprite_at(id, pixels).then_some(id)
    }

    /// Recomputes every cache entry from the atlas.
    pub fn rebuild_cache(&mut self) {
        let mut buf = Vec::with_capacity(SPRITE_PIXELS);
        for id in 0..self.total_sprites() {
            self.atlas.read_sprite_into(id, None, &mut buf);
            self.cache[id] = (!Self::is_empty(&buf)).then(|| buf.as_slice().into());
        }
        self.generation += 1;
    }

    pub fn to_data(&self) -> SpriteData {
        let mut buf = Vec::with_capacity(SPRITE_PIXELS);
        let sprites = (0..self.total_sprites())
            .filter(|&id| !self.is_empty_at(id))
            .map(|id| {
                self.atlas.read_sprite_into(id, None, &mut buf);
                SpriteEntry { id, pixels: buf.clone() }
            })
            .collect();

        SpriteData { pages: self.pages, sprites }
    }

    /// Replaces sprite memory with a persisted record. Entries are checked
    /// before anything is written; ids that do not fit the page count are
    /// skipped.
    pub fn load_data(&mut self, data: &SpriteData) -> Result<(), ConsoleError> {
        if let Some(bad) = data.sprites.iter().find(|s| s.pixels.len() != SPRITE_PIXELS) {
            return Err(ConsoleError::SpriteDataLength {
                index: bad.id,
                expected: SPRITE_PIXELS,
                actual: bad.pixels.len(),
            });
        }

        self.set_pages(data.pages);
        self.clear();

        for entry in &data.sprites {
            if !self.update_sprite_at(entry.id, &entry.pixels) {
                log::warn!("sprite {} does not fit in {} pages, skipped", entry.id, self.pages);
            }
        }
        Ok(())
    }
}

impl Default for SpriteChip {
    fn default() -> Self {
        Self::new(4)
    }
}

impl PixelSource for SpriteChip {
    fn pixel_data(&self) -> &PixelData {
        self.atlas.pixel_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(color: i32) -> Vec<i32> {
        vec![color; SPRITE_PIXELS]
    }

    #[test]
    fn pages_are_clamped() {
        let mut chip = SpriteChip::new(0);
        assert_eq!(chip.pages(), 1);
        assert_eq!(chip.total_sprites(), 256);

        chip.set_pages(20);
        assert_eq!(chip.pages(), MAX_PAGES);
        assert_eq!(chip.total_sprites(), 256 * MAX_PAGES);
    }

    #[test]
    fn empty_sentinel_overwrites_any_buffer() {
        let chip = SpriteChip::default();
        let mut buf = vec![42; 3];
        chip.read_sprite_at(-1, &mut buf);
        assert_eq!(buf.len(), SPRITE_PIXELS);
        assert!(buf.iter().all(|&p| p == EMPTY));

        let mut buf = vec![42; 200];
        chip.read_sprite_at(-1, &mut buf);
        assert_eq!(buf.len(), SPRITE_PIXELS);
        assert!(buf.iter().all(|&p| p == EMPTY));
    }

    #[test]
    fn read_back_written_sprite() {
        let mut chip = SpriteChip::default();
        let pixels: Vec<i32> = (0..SPRITE_PIXELS as i32).map(|i| i % 4).collect();
        assert!(chip.update_sprite_at(17, &pixels));

        let mut buf = Vec::new();
        chip.read_sprite_at(17, &mut buf);
        assert_eq!(buf, pixels);
    }

    #[test]
    fn duplicate_lookup_returns_lowest_index() {
        let mut chip = SpriteChip::default();
        chip.update_sprite_at(9, &solid(2));
        chip.update_sprite_at(4, &solid(2));
        chip.update_sprite_at(12, &solid(2));

        assert_eq!(chip.find_sprite(&solid(2), false), Some(4));
        assert_eq!(chip.find_sprite(&solid(3), false), None);
    }

    #[test]
    fn empty_check_short_circuits() {
        let chip = SpriteChip::default();
        assert_eq!(chip.find_sprite(&solid(EMPTY), true), None);
    }

    #[test]
    fn empty_slots_and_next_id() {
        let mut chip = SpriteChip::default();
        assert_eq!(chip.next_empty_id(), Some(0));

        chip.update_sprite_at(0, &solid(1));
        assert!(!chip.is_empty_at(0));
        assert_eq!(chip.next_empty_id(), Some(1));
        assert_eq!(chip.sprites_in_memory(), 1);

        chip.update_sprite_at(0, &solid(EMPTY));
        assert!(chip.is_empty_at(0));
        assert!(chip.is_empty_at(100_000));
    }

    #[test]
    fn page_change_keeps_cache_for_surviving_sprites() {
        let mut chip = SpriteChip::new(2);
        chip.update_sprite_at(3, &solid(1));
        chip.update_sprite_at(300, &solid(2));
        let generation = chip.cache_generation();

        chip.set_pages(1);
        assert!(chip.cache_generation() > generation);
        assert_eq!(chip.find_sprite(&solid(1), false), Some(3));
        assert_eq!(chip.find_sprite(&solid(2), false), None);

        chip.set_pages(2);
        let mut buf = Vec::new();
        chip.read_sprite_at(300, &mut buf);
        assert!(SpriteChip::is_empty(&buf));
    }

    #[test]
    fn colors_per_sprite_caps_reads() {
        let mut chip = SpriteChip::default();
        chip.set_colors_per_sprite(1);
        let mut pixels = solid(EMPTY);
        pixels[0] = 4;
        pixels[1] = 5;
        chip.update_sprite_at(0, &pixels);

        let mut buf = Vec::new();
        chip.read_sprite_at(0, &mut buf);
        assert_eq!(&buf[..2], &[4, EMPTY]);

        chip.set_colors_per_sprite(0);
        assert_eq!(chip.colors_per_sprite(), 1);
    }

    #[test]
    fn unique_add_reuses_existing_sprite() {
        let mut chip = SpriteChip::default();
        chip.set_unique(true);
        assert_eq!(chip.add_sprite(&solid(3)), Some(0));
        assert_eq!(chip.add_sprite(&solid(3)), Some(0));
        assert_eq!(chip.add_sprite(&solid(4)), Some(1));

        chip.set_unique(false);
        assert_eq!(chip.add_sprite(&solid(3)), Some(2));
        assert_eq!(chip.add_sprite(&[1, 2]), None);
    }

    #[test]
    fn rebuild_cache_recovers_signatures() {
        let mut chip = SpriteChip::default();
        chip.update_sprite_at(5, &solid(6));
        chip.cache.fill(None);
        assert_eq!(chip.find_sprite(&solid(6), false), None);

        chip.rebuild_cache();
        assert_eq!(chip.find_sprite(&solid(6), false), Some(5));
    }

    #[test]
    fn data_round_trip_and_validation() {
        let mut chip = SpriteChip::new(1);
        chip.update_sprite_at(2, &solid(7));
        let data = chip.to_data();
        assert_eq!(data.sprites.len(), 1);

        let mut other = SpriteChip::new(3);
        other.load_data(&data).unwrap();
        assert_eq!(other.pages(), 1);
        assert_eq!(other.find_sprite(&solid(7), false), Some(2));

        let bad = SpriteData { pages: 1, sprites: vec![SpriteEntry { id: 0, pixels: vec![1; 3] }] };
        assert!(matches!(
            other.load_data(&bad),
            Err(ConsoleError::SpriteDataLength { index: 0, expected: 64, actual: 3 })
        ));
        assert_eq!(other.sprites_in_memory(), 1);
    }
}
