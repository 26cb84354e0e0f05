//! Indexed-color pixel buffers.
//!
//! Every chip stores its pixels as palette indices in a [`PixelData`]. The
//! value [`EMPTY`] (-1) marks a pixel that carries no color at all; the
//! compositing routine in this module is the only place that decides how
//! such pixels and mask ids are treated when one buffer is merged into
//! another.

use std::ops::{Index, IndexMut};

/// Sentinel index for "no color".
pub const EMPTY: i32 = -1;

/// Largest width or height accepted by [`PixelData::resize_and_clear`].
pub const MAX_SIZE: usize = 2048;

/// A block of pixels inside a buffer. The origin is the top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: usize, height: usize) -> Self {
        Self { x, y, width, height }
    }

    pub fn total(&self) -> usize {
        self.width.saturating_mul(self.height)
    }
}

/// Anything that can be sampled by a draw call.
pub trait PixelSource {
    fn pixel_data(&self) -> &PixelData;
}

/// A flat, row-major buffer of palette indices.
///
/// `total() == width() * height()` always holds and neither dimension is
/// ever smaller than 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelData {
    pixels: Vec<i32>,
    width: usize,
    height: usize,
}

impl PixelData {
    pub fn new(width: usize, height: usize) -> Self {
        let mut data = Self {
            pixels: Vec::new(),
            width: 1,
            height: 1,
        };
        data.resize(width, height);
        data
    }

    pub fn width(&self) -> usize { self.width }
    pub fn height(&self) -> usize { self.height }
    pub fn total(&self) -> usize { self.pixels.len() }
    pub fn pixels(&self) -> &[i32] { &self.pixels }

    /// Reallocates the buffer. Old contents are discarded and every pixel
    /// reads as index 0 afterwards.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.pixels.clear();
        self.pixels.resize(self.width * self.height, 0);
    }

    /// Clamps both sides to `[1, MAX_SIZE]`, resizes, then fills with [`EMPTY`].
    pub fn resize_and_clear(&mut self, width: usize, height: usize) {
        self.resize(width.clamp(1, MAX_SIZE), height.clamp(1, MAX_SIZE));
        self.clear(EMPTY);
    }

    /// Replaces the contents with `pixels`.
    ///
    /// Missing dimensions default to the current ones. Nothing changes unless
    /// `width * height == pixels.len()`; the return value tells which case
    /// happened.
    pub fn set_pixels(&mut self, pixels: &[i32], width: Option<usize>, height: Option<usize>) -> bool {
        let width = width.unwrap_or(self.width).max(1);
        let height = height.unwrap_or(self.height).max(1);

        if width * height != pixels.len() {
            return false;
        }

        self.pixels.clear();
        self.pixels.extend_from_slice(pixels);
        self.width = width;
        self.height = height;
        true
    }

    pub fn clear(&mut self, color: i32) {
        self.pixels.fill(color);
    }

    /// Reads one pixel by coordinate, `None` when outside the buffer.
    pub fn get(&self, x: i32, y: i32) -> Option<i32> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(self.pixels[x as usize + y as usize * self.width])
    }

    /// Copies a block out of the buffer. Pixels of `rect` that fall outside
    /// the buffer read as [`EMPTY`].
    pub fn get_pixels(&self, rect: Rect) -> Vec<i32> {
        let mut out = Vec::with_capacity(rect.total());
        self.copy_block_into(rect, &mut out);
        out
    }

    /// Same as [`get_pixels`](Self::get_pixels) but reuses `out`.
    pub fn copy_block_into(&self, rect: Rect, out: &mut Vec<i32>) {
        out.clear();
        out.resize(rect.total(), EMPTY);

        let inside = rect.x >= 0
            && rect.y >= 0
            && rect.x as usize + rect.width <= self.width
            && rect.y as usize + rect.height <= self.height;

        if inside {
            let (x, y) = (rect.x as usize, rect.y as usize);
            for row in 0..rect.height {
                let start = x + (y + row) * self.width;
                out[row * rect.width..(row + 1) * rect.width]
                    .copy_from_slice(&self.pixels[start..start + rect.width]);
            }
            return;
        }

        for row in 0..rect.height {
            for col in 0..rect.width {
                if let Some(p) = self.get(rect.x + col as i32, rect.y + row as i32) {
                    out[col + row * rect.width] = p;
                }
            }
        }
    }

    /// Writes a `width * height` block at `(x, y)`, clipped to the buffer.
    /// Returns false without writing when `src` is too short.
    pub fn set_block(&mut self, src: &[i32], x: i32, y: i32, width: usize, height: usize) -> bool {
        if src.len() < width * height {
            return false;
        }

        for row in 0..height {
            let ty = y + row as i32;
            if ty < 0 || ty as usize >= self.height {
                continue;
            }
            for col in 0..width {
                let tx = x + col as i32;
                if tx < 0 || tx as usize >= self.width {
                    continue;
                }
                self.pixels[tx as usize + ty as usize * self.width] = src[col + row * width];
            }
        }
        true
    }
}

impl Default for PixelData {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl Index<usize> for PixelData {
    type Output = i32;

    fn index(&self, index: usize) -> &i32 {
        &self.pixels[index]
    }
}

impl IndexMut<usize> for PixelData {
    fn index_mut(&mut self, index: usize) -> &mut i32 {
        &mut self.pixels[index]
    }
}

impl PixelSource for PixelData {
    fn pixel_data(&self) -> &PixelData {
        self
    }
}

/// Per-merge transform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeOptions {
    pub flip_h: bool,
    pub flip_v: bool,
    /// Added to every non-empty source index, saturating at the `i32` range.
    pub color_offset: i32,
    /// Source pixels equal to this id are skipped and leave the destination
    /// untouched. `None` copies every pixel, empty ones included.
    pub mask: Option<i32>,
}

/// Merges the `sample` block of `src` into `dest` at `(dest_x, dest_y)`.
///
/// Sample pixels outside `src` and target pixels outside `dest` are skipped.
pub fn merge_pixels(
    src: &PixelData,
    sample: Rect,
    dest: &mut PixelData,
    dest_x: i32,
    dest_y: i32,
    opts: MergeOptions,
) {
    if sample.total() == 0 {
        return;
    }

    let (src_w, src_h) = (src.width as i32, src.height as i32);
    let (dest_w, dest_h) = (dest.width as i32, dest.height as i32);
    let (block_w, block_h) = (sample.width as i32, sample.height as i32);

    for row in 0..block_h {
        let sy = sample.y + row;
        if sy < 0 || sy >= src_h {
            continue;
        }

        let ty = (if opts.flip_v { block_h - 1 - row } else { row }) + dest_y;
        if ty < 0 || ty >= dest_h {
            continue;
        }

        for col in 0..block_w {
            let sx = sample.x + col;
            if sx < 0 || sx >= src_w {
                continue;
            }

            let pixel = src.pixels[(sx + sy * src_w) as usize];
            if opts.mask == Some(pixel) {
                continue;
            }

            let tx = (if opts.flip_h { block_w - 1 - col } else { col }) + dest_x;
            if tx < 0 || tx >= dest_w {
                continue;
            }

            dest.pixels[(tx + ty * dest_w) as usize] = if pixel == EMPTY {
                EMPTY
            } else {
                pixel.saturating_add(opts.color_offset)
            };
        }
    }
}
