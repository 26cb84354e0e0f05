#![forbid(unsafe_code)]

//! Pixel Vision 8 style virtual graphics hardware.
//!
//! [`Console`] owns one of each chip and drives the per-frame protocol:
//! draw calls are queued during the frame and composited by
//! [`Console::run_frame`]. Runners read the result as palette indices
//! ([`Console::pixels`]) or as RGBA bytes ([`Console::framebuffer_rgba`]).

use crate::color::ColorChip;
use crate::display::{DisplayChip, DrawOptions};
use crate::font::FontChip;
use crate::pixel_data::{PixelData, Rect};
use crate::sprite::{SpriteChip, SPRITE_PIXELS, SPRITE_SIZE};
use crate::tilemap::TilemapChip;
use crate::video::{framebuffer_to_rgba, Palette};

pub mod color;
pub mod config;
pub mod display;
pub mod error;
pub mod font;
pub mod game_data;
pub mod log_buffer;
pub mod pixel_data;
pub mod sprite;
pub mod tilemap;
pub mod video;

pub use config::ConsoleConfig;
pub use error::ConsoleError;
pub use game_data::GameData;

pub struct Console {
    colors: ColorChip,
    sprites: SpriteChip,
    tilemap: TilemapChip,
    fonts: FontChip,
    display: DisplayChip,
    frame: u64,
    palette: Palette,
    rgba_frame: Vec<u8>,
    sprite_buf: Vec<i32>,
    text_buf: PixelData,
}

impl Console {
    /// Builds every chip from `config`. Palette entries that fail to parse
    /// are reported and the default palette is kept.
    pub fn new(config: &ConsoleConfig) -> Self {
        let mut colors = ColorChip::new();
        let color_data = color::ColorData {
            colors: config.palette.clone(),
            background_color: config.background_color,
            mask_color: config.mask_color.clone(),
        };
        if let Err(err) = colors.load_data(&color_data) {
            log::warn!("keeping default palette: {}", err);
        }

        let mut sprites = SpriteChip::new(config.sprite_pages);
        sprites.set_colors_per_sprite(config.colors_per_sprite);

        let mut tilemap = TilemapChip::new(config.tilemap_columns, config.tilemap_rows);
        tilemap.set_total_flags(config.total_flags);

        let mut display = DisplayChip::new(config.display_width, config.display_height);
        display.set_max_draw_requests(config.max_draw_requests);

        log::debug!(
            "console ready: {}x{} display, {} sprite pages, {}x{} tilemap",
            display.width(),
            display.height(),
            sprites.pages(),
            tilemap.columns(),
            tilemap.rows()
        );

        Self {
            colors,
            sprites,
            tilemap,
            fonts: FontChip::new(config.font_pages),
            display,
            frame: 0,
            palette: Palette::default(),
            rgba_frame: Vec::new(),
            sprite_buf: Vec::with_capacity(SPRITE_PIXELS),
            text_buf: PixelData::default(),
        }
    }

    pub fn colors(&self) -> &ColorChip { &self.colors }
    pub fn colors_mut(&mut self) -> &mut ColorChip { &mut self.colors }
    pub fn sprites(&self) -> &SpriteChip { &self.sprites }
    pub fn tilemap(&self) -> &TilemapChip { &self.tilemap }
    pub fn tilemap_mut(&mut self) -> &mut TilemapChip { &mut self.tilemap }
    pub fn fonts(&self) -> &FontChip { &self.fonts }
    pub fn fonts_mut(&mut self) -> &mut FontChip { &mut self.fonts }
    pub fn display(&self) -> &DisplayChip { &self.display }
    pub fn display_mut(&mut self) -> &mut DisplayChip { &mut self.display }

    /// Frames composited so far.
    pub fn frame(&self) -> u64 { self.frame }

    /// Writes a sprite and marks every tile showing it for redraw.
    pub fn update_sprite_at(&mut self, id: usize, pixels: &[i32]) -> bool {
        let updated = self.sprites.update_sprite_at(id, pixels);
        if updated {
            self.tilemap.invalidate_tile_id(id as i32);
        }
        updated
    }

    pub fn set_sprite_pages(&mut self, pages: usize) {
        self.sprites.set_pages(pages);
        self.tilemap.invalidate_all();
    }

    pub fn draw_sprite(&mut self, id: i32, x: i32, y: i32, options: DrawOptions) -> bool {
        self.sprites.read_sprite_at(id, &mut self.sprite_buf);
        self.display.new_draw_call(&self.sprite_buf, SPRITE_SIZE, SPRITE_SIZE, x, y, options)
    }

    pub fn draw_pixels(&mut self, pixels: &[i32], width: usize, height: usize, x: i32, y: i32, options: DrawOptions) -> bool {
        self.display.new_draw_call(pixels, width, height, x, y, options)
    }

    /// Queues the `sample` region of the composited tilemap, in pixels.
    pub fn draw_tilemap(&mut self, sample: Rect, x: i32, y: i32, options: DrawOptions) -> bool {
        let cache = self.tilemap.pixel_data(&self.sprites);
        self.display.new_draw_call_from(cache, sample, x, y, options)
    }

    /// Renders `text` and queues it. Empty text queues nothing.
    pub fn draw_text(&mut self, text: &str, x: i32, y: i32, font: &str, letter_spacing: i32, options: DrawOptions) -> bool {
        if text.is_empty() {
            return false;
        }
        self.fonts.convert_text_to_pixel_data(text, font, letter_spacing, &mut self.text_buf);
        let sample = Rect::new(0, 0, self.text_buf.width(), self.text_buf.height());
        self.display.new_draw_call_from(&self.text_buf, sample, x, y, options)
    }

    /// Clears the framebuffer before the next composite.
    pub fn clear(&mut self) {
        self.display.clear();
    }

    /// Composites the queued draw calls and advances the frame counter.
    pub fn run_frame(&mut self) {
        self.display.draw();
        self.frame += 1;
        log_buffer::set_frame(self.frame);
    }

    pub fn pixels(&self) -> &[i32] {
        self.display.pixels()
    }

    pub fn hex_colors(&self) -> &[String] {
        self.colors.hex_colors()
    }

    /// The framebuffer as RGBA8888. The color table is rebuilt only after
    /// the palette changed. Empty pixels show the background color, or the
    /// mask color in debug mode.
    pub fn framebuffer_rgba(&mut self) -> &[u8] {
        if self.colors.invalid() {
            let empty = if self.colors.debug_mode() {
                self.colors.mask_color()
            } else {
                self.colors.read_color_at(self.colors.background_color())
            };
            self.palette = Palette::from_hex(self.colors.hex_colors(), empty);
            self.colors.reset_validation();
        }

        framebuffer_to_rgba(&mut self.rgba_frame, self.display.pixels(), &self.palette);
        &self.rgba_frame
    }

    pub fn to_game_data(&self) -> GameData {
        GameData {
            colors: Some(self.colors.to_data()),
            sprites: Some(self.sprites.to_data()),
            tilemap: Some(self.tilemap.to_data()),
            fonts: Some(self.fonts.to_data()),
        }
    }

    /// Loads every section present in `data`. Sections are applied in order
    /// and each one is validated before its chip changes.
    pub fn apply_game_data(&mut self, data: &GameData) -> Result<(), ConsoleError> {
        if let Some(colors) = &data.colors {
            self.colors.load_data(colors)?;
        }
        if let Some(sprites) = &data.sprites {
            self.sprites.load_data(sprites)?;
            self.tilemap.invalidate_all();
        }
        if let Some(tilemap) = &data.tilemap {
            self.tilemap.load_data(tilemap)?;
        }
        if let Some(fonts) = &data.fonts {
            self.fonts.load_data(fonts)?;
        }
        Ok(())
    }

    pub fn load_game_data(&mut self, json: &str) -> Result<(), ConsoleError> {
        let data = GameData::from_json(json)?;
        self.apply_game_data(&data)
    }

    pub fn save_game_data(&self) -> Result<String, ConsoleError> {
        self.to_game_data().to_json()
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new(&ConsoleConfig::default())
    }
}
