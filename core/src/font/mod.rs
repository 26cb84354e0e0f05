//! Bitmap fonts.
//!
//! A font is an ordered list of sprite ids, one per printable ASCII glyph
//! starting at the space character. Glyph pixels live in the chip's own
//! sprite memory, kept separate from the game sprites.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConsoleError;
use crate::pixel_data::{merge_pixels, MergeOptions, PixelData, PixelSource, Rect, EMPTY};
use crate::sprite::{SpriteChip, SpriteData, SPRITE_PIXELS, SPRITE_SIZE};

/// Character code of the first glyph in every font map.
pub const FIRST_GLYPH: u32 = 32;
pub const TAB_WIDTH: usize = 5;

const FONT_PAGES: usize = 2;
const FONT_COLORS_PER_SPRITE: usize = 2;

/// Persisted fonts: glyph memory plus the name to sprite id maps.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontData {
    pub sprites: SpriteData,
    pub fonts: IndexMap<String, Vec<i32>>,
}

pub struct FontChip {
    sprites: SpriteChip,
    fonts: IndexMap<String, Vec<i32>>,
    glyph: PixelData,
    sprite_buf: Vec<i32>,
}

impl FontChip {
    pub fn new(pages: usize) -> Self {
        let mut sprites = SpriteChip::new(pages);
        sprites.set_colors_per_sprite(FONT_COLORS_PER_SPRITE);
        sprites.set_unique(true);

        Self {
            sprites,
            fonts: IndexMap::new(),
            glyph: PixelData::new(SPRITE_SIZE, SPRITE_SIZE),
            sprite_buf: Vec::with_capacity(SPRITE_PIXELS),
        }
    }

    pub fn sprites(&self) -> &SpriteChip { &self.sprites }
    pub fn sprites_mut(&mut self) -> &mut SpriteChip { &mut self.sprites }

    /// Registers a font, replacing any font with the same name. A replaced
    /// font keeps its place in the registry.
    pub fn add_font(&mut self, name: &str, font_map: Vec<i32>) {
        log::debug!("font '{}' registered with {} glyphs", name, font_map.len());
        self.fonts.insert(name.to_string(), font_map);
    }

    /// Stores glyph pixels in font memory and registers the resulting map.
    /// Identical glyphs share one sprite. Blank glyphs, and glyphs that do
    /// not fit, get id -1.
    pub fn import_font(&mut self, name: &str, glyphs: &[Vec<i32>]) -> Vec<i32> {
        let font_map: Vec<i32> = glyphs
            .iter()
            .map(|pixels| {
                if SpriteChip::is_empty(pixels) {
                    return EMPTY;
                }
                self.sprites.add_sprite(pixels).map_or(EMPTY, |id| id as i32)
            })
            .collect();

        if glyphs.iter().zip(&font_map).any(|(g, &id)| id == EMPTY && !SpriteChip::is_empty(g)) {
            log::warn!("font '{}' has glyphs that did not fit in font memory", name);
        }

        self.add_font(name, font_map.clone());
        font_map
    }

    pub fn read_font(&self, name: &str) -> Option<&[i32]> {
        self.fonts.get(name).map(Vec::as_slice)
    }

    pub fn font_names(&self) -> impl Iterator<Item = &str> {
        self.fonts.keys().map(String::as_str)
    }

    pub fn total_fonts(&self) -> usize {
        self.fonts.len()
    }

    /// Named font, or the first registered one when the name is unknown.
    fn font_or_first(&self, name: &str) -> Option<&[i32]> {
        self.fonts
            .get(name)
            .or_else(|| self.fonts.first().map(|(_, map)| map))
            .map(Vec::as_slice)
    }

    /// Sprite id for each character of `text`, -1 where the font has no glyph.
    pub fn convert_text_to_sprites(&self, text: &str, font: &str) -> Vec<i32> {
        let Some(map) = self.font_or_first(font) else {
            return vec![EMPTY; text.chars().count()];
        };
        text.chars().map(|c| glyph_id(map, c)).collect()
    }

    /// Renders `text` into `out`, first line at the top.
    ///
    /// Each line advances `8 + letter_spacing` pixels per character and 8
    /// pixels per line. `out` is resized to fit the block and every pixel
    /// not covered by a glyph is left empty. With no fonts registered `out`
    /// becomes a single empty pixel.
    pub fn convert_text_to_pixel_data(&mut self, text: &str, font: &str, letter_spacing: i32, out: &mut PixelData) {
        let Some(map) = self.font_or_first(font).map(<[i32]>::to_vec) else {
            out.resize_and_clear(1, 1);
            return;
        };

        let text = text.replace('\t', &" ".repeat(TAB_WIDTH));
        let lines = split_lines(&text);
        let advance = (SPRITE_SIZE as i32 + letter_spacing).max(1) as usize;
        let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);

        let width = (advance * longest).max(1);
        let height = SPRITE_SIZE * lines.len();
        if out.width() != width || out.height() != height {
            out.resize(width, height);
        }
        out.clear(EMPTY);

        for (row, line) in lines.iter().enumerate() {
            for (col, c) in line.chars().enumerate() {
                let id = glyph_id(&map, c);
                if id == EMPTY {
                    continue;
                }

                self.sprites.read_sprite_at(id, &mut self.sprite_buf);
                self.glyph.set_pixels(&self.sprite_buf, Some(SPRITE_SIZE), Some(SPRITE_SIZE));
                merge_pixels(
                    &self.glyph,
                    Rect::new(0, 0, SPRITE_SIZE, SPRITE_SIZE),
                    out,
                    (col * advance) as i32,
                    (row * SPRITE_SIZE) as i32,
                    MergeOptions { mask: Some(EMPTY), ..Default::default() },
                );
            }
        }
    }

    pub fn to_data(&self) -> FontData {
        FontData {
            sprites: self.sprites.to_data(),
            fonts: self.fonts.clone(),
        }
    }

    pub fn load_data(&mut self, data: &FontData) -> Result<(), ConsoleError> {
        self.sprites.load_data(&data.sprites)?;
        self.fonts = data.fonts.clone();
        log::debug!("loaded {} fonts", self.fonts.len());
        Ok(())
    }
}

impl Default for FontChip {
    fn default() -> Self {
        Self::new(FONT_PAGES)
    }
}

impl PixelSource for FontChip {
    fn pixel_data(&self) -> &PixelData {
        self.sprites.pixel_data()
    }
}

fn glyph_id(map: &[i32], c: char) -> i32 {
    (c as u32)
        .checked_sub(FIRST_GLYPH)
        .and_then(|i| map.get(i as usize))
        .copied()
        .unwrap_or(EMPTY)
}

/// Splits on `\n`, dropping the `\r` of Windows line endings.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l)).collect()
}

/// Greedy word wrap to `width` characters per line.
///
/// Long lines break at the last whitespace that keeps them within `width`
/// and the whitespace at the break is dropped. A word longer than `width`
/// is cut mid-word. Indentation that would have to be split off the
/// first word becomes an empty line of its own. Existing line breaks are
/// kept, including empty lines. A `width` of 0 returns the text unchanged.
pub fn word_wrap(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_string();
    }

    let mut wrapped = Vec::new();
    for line in split_lines(text) {
        let chars: Vec<char> = line.chars().collect();
        if chars.is_empty() {
            wrapped.push(String::new());
            continue;
        }

        let mut pos = 0;
        while pos < chars.len() {
            let rest = &chars[pos..];
            let len = if rest.len() > width { break_line(rest, width) } else { rest.len() };
            wrapped.push(rest[..len].iter().collect());

            pos += len;
            while pos < chars.len() && chars[pos].is_whitespace() {
                pos += 1;
            }
        }
    }
    wrapped.join("\n")
}

/// Length of the first line when `line` is broken at `max` characters:
/// up to the last whitespace run at or before `max`, or `max` itself when
/// the line has no whitespace there. Returns 0 when that whitespace is the
/// line's leading indentation.
pub fn break_line(line: &[char], max: usize) -> usize {
    let max = max.min(line.len().saturating_sub(1));

    let Some(space) = line[..=max].iter().rposition(|c| c.is_whitespace()) else {
        return max.max(1);
    };

    line[..space]
        .iter()
        .rposition(|c| !c.is_whitespace())
        .map_or(0, |i| i + 1)
}
