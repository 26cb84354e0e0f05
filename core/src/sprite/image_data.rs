use crate::pixel_data::{PixelData, Rect, EMPTY};

use super::{SPRITE_PIXELS, SPRITE_SIZE};

/// Largest colors-per-sprite cap the atlas has to track on a read.
const MAX_TRACKED_COLORS: usize = 16;

/// A pixel atlas cut into 8x8 cells, numbered left to right, top to bottom.
pub struct ImageData {
    pixel_data: PixelData,
}

impl ImageData {
    /// A blank atlas: every cell holds the empty sprite.
    pub fn new(width: usize, height: usize) -> Self {
        let mut pixel_data = PixelData::default();
        pixel_data.resize_and_clear(width, height);
        Self { pixel_data }
    }

    pub fn pixel_data(&self) -> &PixelData { &self.pixel_data }
    pub fn width(&self) -> usize { self.pixel_data.width() }
    pub fn height(&self) -> usize { self.pixel_data.height() }
    pub fn columns(&self) -> usize { self.width() / SPRITE_SIZE }
    pub fn rows(&self) -> usize { self.height() / SPRITE_SIZE }
    pub fn total_sprites(&self) -> usize { self.columns() * self.rows() }

    fn cell(&self, id: usize) -> Rect {
        let columns = self.columns().max(1);
        Rect::new(
            ((id % columns) * SPRITE_SIZE) as i32,
            ((id / columns) * SPRITE_SIZE) as i32,
            SPRITE_SIZE,
            SPRITE_SIZE,
        )
    }

    /// Copies sprite `id` into `out`. With a `cps` cap, only the first `cps`
    /// distinct color ids survive; later ones read as empty.
    pub fn read_sprite_into(&self, id: usize, cps: Option<usize>, out: &mut Vec<i32>) {
        self.pixel_data.copy_block_into(self.cell(id), out);

        let Some(cps) = cps else {
            return;
        };

        let cps = cps.min(MAX_TRACKED_COLORS);
        let mut seen = [0i32; MAX_TRACKED_COLORS];
        let mut count = 0;

        for pixel in out.iter_mut() {
            if *pixel <= EMPTY || seen[..count].contains(pixel) {
                continue;
            }
            if count < cps {
                seen[count] = *pixel;
                count += 1;
            } else {
                *pixel = EMPTY;
            }
        }
    }

    /// Writes one cell. Blocks of the wrong size and ids past the end of the
    /// atlas are ignored.
    pub fn write_sprite(&mut self, id: usize, pixels: &[i32]) -> bool {
        if pixels.len() != SPRITE_PIXELS || id >= self.total_sprites() {
            return false;
        }

        let cell = self.cell(id);
        self.pixel_data.set_block(pixels, cell.x, cell.y, SPRITE_SIZE, SPRITE_SIZE)
    }

    /// Resizes the atlas and keeps the overlapping top-left region, so sprite
    /// ids stay put as long as the column count does not change.
    pub fn resize_preserving(&mut self, width: usize, height: usize) {
        let old = std::mem::take(&mut self.pixel_data);
        self.pixel_data.resize_and_clear(width, height);

        let keep = Rect::new(
            0,
            0,
            old.width().min(self.pixel_data.width()),
            old.height().min(self.pixel_data.height()),
        );
        let block = old.get_pixels(keep);
        self.pixel_data.set_block(&block, 0, 0, keep.width, keep.height);
    }

    pub fn clear(&mut self) {
        self.pixel_data.clear(EMPTY);
    }
}
