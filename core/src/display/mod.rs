//! Frame compositor.
//!
//! Draw calls issued during a frame are copied into pooled requests and
//! composited in one pass by [`DisplayChip::draw`], lowest layer first.
//! Requests on the same layer keep submission order, so later calls end
//! up on top.

use crate::pixel_data::{merge_pixels, MergeOptions, PixelData, PixelSource, Rect, EMPTY};

pub const DEFAULT_WIDTH: usize = 256;
pub const DEFAULT_HEIGHT: usize = 240;
pub const DEFAULT_MAX_DRAW_REQUESTS: usize = 1024;

/// Per-call transform and layering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawOptions {
    /// Composite priority. Lower layers are drawn first.
    pub layer: u8,
    pub flip_h: bool,
    pub flip_v: bool,
    pub color_offset: i32,
    /// Source pixels with this value are transparent.
    pub mask_id: i32,
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            layer: 0,
            flip_h: false,
            flip_v: false,
            color_offset: 0,
            mask_id: EMPTY,
        }
    }
}

/// One queued blit. The sampled pixels are copied at submission time.
#[derive(Clone, Debug, Default)]
pub struct DrawRequest {
    pixels: PixelData,
    x: i32,
    y: i32,
    options: DrawOptions,
}

impl DrawRequest {
    pub fn pixels(&self) -> &PixelData { &self.pixels }
    pub fn x(&self) -> i32 { self.x }
    pub fn y(&self) -> i32 { self.y }
    pub fn options(&self) -> &DrawOptions { &self.options }
}

pub struct DisplayChip {
    framebuffer: PixelData,
    pool: Vec<DrawRequest>,
    pending: usize,
    order: Vec<usize>,
    sample_buf: Vec<i32>,
    max_draw_requests: usize,
    clear_flag: bool,
    dropped: usize,
}

impl DisplayChip {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            framebuffer: PixelData::new(width, height),
            pool: vec![DrawRequest::default(); DEFAULT_MAX_DRAW_REQUESTS],
            pending: 0,
            order: Vec::new(),
            sample_buf: Vec::new(),
            max_draw_requests: DEFAULT_MAX_DRAW_REQUESTS,
            clear_flag: true,
            dropped: 0,
        }
    }

    pub fn width(&self) -> usize { self.framebuffer.width() }
    pub fn height(&self) -> usize { self.framebuffer.height() }

    /// Composited palette indices, row-major.
    pub fn pixels(&self) -> &[i32] { self.framebuffer.pixels() }

    pub fn max_draw_requests(&self) -> usize { self.max_draw_requests }
    pub fn pending_draw_calls(&self) -> usize { self.pending }

    /// Draw calls rejected since the last composite.
    pub fn dropped_draw_calls(&self) -> usize { self.dropped }

    /// Requests waiting for the next composite, in submission order.
    pub fn pending_requests(&self) -> &[DrawRequest] {
        &self.pool[..self.pending]
    }

    /// Resizes the request pool. A limit of 0 is ignored.
    pub fn set_max_draw_requests(&mut self, value: usize) {
        if value == 0 {
            return;
        }
        self.max_draw_requests = value;
        self.pool.resize_with(value.max(self.pending), DrawRequest::default);
    }

    /// Resizes the framebuffer. Old content is lost and the next composite
    /// starts from a buffer of index 0.
    pub fn reset_resolution(&mut self, width: usize, height: usize) {
        self.framebuffer.resize(width, height);
        self.clear_flag = true;
        log::debug!("display resolution reset to {}x{}", self.width(), self.height());
    }

    /// Requests a cleared framebuffer at the start of the next composite.
    pub fn clear(&mut self) {
        self.clear_flag = true;
    }

    /// Next free pooled request, or `None` once the frame is at capacity.
    fn next_draw_request(&mut self) -> Option<&mut DrawRequest> {
        if self.pending >= self.max_draw_requests {
            self.dropped += 1;
            if self.dropped == 1 {
                log::warn!(
                    "draw request limit of {} reached, dropping further calls this frame",
                    self.max_draw_requests
                );
            }
            return None;
        }

        if self.pool.len() <= self.pending {
            self.pool.push(DrawRequest::default());
        }
        self.pending += 1;
        self.pool.get_mut(self.pending - 1)
    }

    /// Queues a raw block of `width * height` palette indices. Returns
    /// false if the block has the wrong size or the frame is full.
    pub fn new_draw_call(
        &mut self,
        pixels: &[i32],
        width: usize,
        height: usize,
        x: i32,
        y: i32,
        options: DrawOptions,
    ) -> bool {
        if width == 0 || height == 0 || width.checked_mul(height) != Some(pixels.len()) {
            log::warn!(
                "draw call ignored, {} pixels do not make a {}x{} block",
                pixels.len(),
                width,
                height
            );
            return false;
        }

        let Some(request) = self.next_draw_request() else {
            return false;
        };
        request.pixels.set_pixels(pixels, Some(width), Some(height));
        request.x = x;
        request.y = y;
        request.options = options;

        #[cfg(feature = "trace_display")]
        log::trace!("draw call {}x{} at {},{} layer {}", width, height, x, y, options.layer);

        true
    }

    /// Queues the `sample` block of any pixel source. Parts of the sample
    /// outside the source read as empty. Samples wider or taller than both
    /// the source and the framebuffer are rejected.
    pub fn new_draw_call_from<S: PixelSource + ?Sized>(
        &mut self,
        source: &S,
        sample: Rect,
        x: i32,
        y: i32,
        options: DrawOptions,
    ) -> bool {
        if sample.total() == 0 {
            return false;
        }

        let data = source.pixel_data();
        let max_width = data.width().max(self.framebuffer.width());
        let max_height = data.height().max(self.framebuffer.height());
        if sample.width > max_width || sample.height > max_height {
            log::warn!(
                "draw call ignored, {}x{} sample is larger than its {}x{} source",
                sample.width,
                sample.height,
                data.width(),
                data.height()
            );
            return false;
        }

        let mut buf = std::mem::take(&mut self.sample_buf);
        data.copy_block_into(sample, &mut buf);
        let queued = self.new_draw_call(&buf, sample.width, sample.height, x, y, options);
        self.sample_buf = buf;
        queued
    }

    /// Composites every pending request into the framebuffer and starts a
    /// new frame.
    pub fn draw(&mut self) {
        if self.clear_flag {
            self.framebuffer.clear(0);
            self.clear_flag = false;
        }

        self.order.clear();
        self.order.extend(0..self.pending);
        let pool = &self.pool;
        self.order.sort_by_key(|&i| (pool[i].options.layer, i));

        for &i in &self.order {
            let request = &self.pool[i];
            let options = request.options;
            merge_pixels(
                &request.pixels,
                Rect::new(0, 0, request.pixels.width(), request.pixels.height()),
                &mut self.framebuffer,
                request.x,
                request.y,
                MergeOptions {
                    flip_h: options.flip_h,
                    flip_v: options.flip_v,
                    color_offset: options.color_offset,
                    mask: Some(options.mask_id),
                },
            );
        }

        #[cfg(feature = "trace_display")]
        log::trace!("composited {} draw calls ({} dropped)", self.pending, self.dropped);

        self.reset_draw_calls();
    }

    /// Drops pending requests without drawing them.
    pub fn reset_draw_calls(&mut self) {
        self.pending = 0;
        self.dropped = 0;
    }
}

impl Default for DisplayChip {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

impl PixelSource for DisplayChip {
    fn pixel_data(&self) -> &PixelData {
        &self.framebuffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(layer: u8) -> DrawOptions {
        DrawOptions { layer, ..Default::default() }
    }

    #[test]
    fn first_frame_starts_cleared() {
        let mut display = DisplayChip::new(4, 4);
        display.draw();
        assert!(display.pixels().iter().all(|&p| p == 0));
    }

    #[test]
    fn admission_is_capped_per_frame() {
        let mut display = DisplayChip::new(8, 1);
        display.set_max_draw_requests(4);

        for x in 0..6 {
            display.new_draw_call(&[x + 1], 1, 1, x, 0, DrawOptions::default());
        }
        assert_eq!(display.pending_draw_calls(), 4);
        assert_eq!(display.dropped_draw_calls(), 2);

        display.draw();
        assert_eq!(display.pixels(), &[1, 2, 3, 4, 0, 0, 0, 0]);
        assert_eq!(display.dropped_draw_calls(), 0);

        assert!(display.new_draw_call(&[9], 1, 1, 7, 0, DrawOptions::default()));
    }

    #[test]
    fn pool_is_allocated_up_front() {
        let mut display = DisplayChip::default();
        assert_eq!(display.pool.len(), DEFAULT_MAX_DRAW_REQUESTS);

        display.set_max_draw_requests(2048);
        assert_eq!(display.pool.len(), 2048);
        display.set_max_draw_requests(16);
        assert_eq!(display.pool.len(), 16);
    }

    #[test]
    fn oversized_blocks_are_rejected() {
        let mut display = DisplayChip::new(4, 4);
        assert!(!display.new_draw_call(&[1], usize::MAX, 2, 0, 0, DrawOptions::default()));

        let source = PixelData::new(2, 2);
        let huge = Rect::new(0, 0, usize::MAX / 2, 1 << 20);
        assert!(!display.new_draw_call_from(&source, huge, 0, 0, DrawOptions::default()));
        assert!(!display.new_draw_call_from(&source, Rect::new(0, 0, 5, 1), 0, 0, DrawOptions::default()));
        assert_eq!(display.pending_draw_calls(), 0);

        assert!(display.new_draw_call_from(&source, Rect::new(0, 0, 4, 4), 0, 0, DrawOptions::default()));
    }

    #[test]
    fn zero_limit_is_ignored() {
        let mut display = DisplayChip::default();
        display.set_max_draw_requests(0);
        assert_eq!(display.max_draw_requests(), DEFAULT_MAX_DRAW_REQUESTS);
    }

    #[test]
    fn masked_block_leaves_frame_untouched() {
        let mut display = DisplayChip::new(2, 2);
        display.new_draw_call(&[1, 2, 3, 4], 2, 2, 0, 0, DrawOptions::default());
        display.draw();

        let opts = DrawOptions { mask_id: 7, ..Default::default() };
        display.new_draw_call(&[7; 4], 2, 2, 0, 0, opts);
        display.draw();
        assert_eq!(display.pixels(), &[1, 2, 3, 4]);
    }

    #[test]
    fn same_layer_keeps_submission_order() {
        let mut display = DisplayChip::new(3, 1);
        display.new_draw_call(&[5, 5], 2, 1, 0, 0, layer(5));
        display.new_draw_call(&[1, 1, 1], 3, 1, 0, 0, layer(1));
        display.new_draw_call(&[6, 6], 2, 1, 1, 0, layer(5));
        display.draw();
        assert_eq!(display.pixels(), &[5, 6, 6]);
    }

    #[test]
    fn reset_resolution_clears_old_frame() {
        let mut display = DisplayChip::new(4, 4);
        display.new_draw_call(&[3; 16], 4, 4, 0, 0, DrawOptions::default());
        display.draw();

        display.reset_resolution(2, 2);
        display.new_draw_call(&[8], 1, 1, 1, 1, DrawOptions::default());
        display.draw();
        assert_eq!((display.width(), display.height()), (2, 2));
        assert_eq!(display.pixels(), &[0, 0, 0, 8]);
    }

    #[test]
    fn unclear_frames_accumulate() {
        let mut display = DisplayChip::new(2, 1);
        display.new_draw_call(&[4], 1, 1, 0, 0, DrawOptions::default());
        display.draw();
        display.new_draw_call(&[5], 1, 1, 1, 0, DrawOptions::default());
        display.draw();
        assert_eq!(display.pixels(), &[4, 5]);

        display.clear();
        display.draw();
        assert_eq!(display.pixels(), &[0, 0]);
    }

    #[test]
    fn wrong_block_size_is_rejected() {
        let mut display = DisplayChip::new(2, 2);
        assert!(!display.new_draw_call(&[1, 2, 3], 2, 2, 0, 0, DrawOptions::default()));
        assert_eq!(display.pending_draw_calls(), 0);
    }

    #[test]
    fn sample_is_copied_at_submission() {
        let mut source = PixelData::new(4, 4);
        source.clear(2);

        let mut display = DisplayChip::new(2, 2);
        display.new_draw_call_from(&source, Rect::new(1, 1, 2, 2), 0, 0, DrawOptions::default());
        source.clear(9);
        display.draw();
        assert_eq!(display.pixels(), &[2; 4]);
    }

    #[test]
    fn sample_outside_source_is_transparent() {
        let mut source = PixelData::new(1, 1);
        source.clear(3);

        let mut display = DisplayChip::new(2, 1);
        display.new_draw_call_from(&source, Rect::new(0, 0, 2, 1), 0, 0, DrawOptions::default());
        display.draw();
        assert_eq!(display.pixels(), &[3, 0]);
    }

    #[test]
    fn flips_and_offset_apply() {
        let mut display = DisplayChip::new(2, 2);
        let opts = DrawOptions { flip_h: true, flip_v: true, color_offset: 10, ..Default::default() };
        display.new_draw_call(&[1, 2, 3, EMPTY], 2, 2, 0, 0, opts);
        display.draw();
        assert_eq!(display.pixels(), &[0, 13, 12, 11]);
    }
}
