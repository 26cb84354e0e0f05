//! Whole-console frame tests: draw calls in, composited palette indices out.

use pv8_core::display::DrawOptions;
use pv8_core::pixel_data::{Rect, EMPTY};
use pv8_core::sprite::SPRITE_PIXELS;
use pv8_core::{Console, ConsoleConfig};

fn console(width: usize, height: usize) -> Console {
    Console::new(&ConsoleConfig {
        display_width: width,
        display_height: height,
        tilemap_columns: 4,
        tilemap_rows: 4,
        ..Default::default()
    })
}

fn at(console: &Console, x: usize, y: usize) -> i32 {
    console.pixels()[x + y * console.display().width()]
}

// ============================================================================
// ADMISSION
// ============================================================================

#[test]
fn overflowing_draw_calls_have_no_effect() {
    let mut console = Console::new(&ConsoleConfig {
        display_width: 8,
        display_height: 1,
        max_draw_requests: 3,
        ..Default::default()
    });

    let accepted: Vec<bool> = (0..8)
        .map(|x| console.draw_pixels(&[x + 1], 1, 1, x, 0, DrawOptions::default()))
        .collect();
    assert_eq!(accepted.iter().filter(|&&a| a).count(), 3);

    console.run_frame();
    assert_eq!(console.pixels(), &[1, 2, 3, 0, 0, 0, 0, 0]);
}

// ============================================================================
// TRANSPARENCY AND ORDER
// ============================================================================

#[test]
fn fully_masked_sprite_is_invisible() {
    let mut console = console(8, 8);
    console.draw_pixels(&[4; 64], 8, 8, 0, 0, DrawOptions::default());
    console.run_frame();

    let masked = DrawOptions { mask_id: 9, ..Default::default() };
    console.draw_pixels(&[9; 64], 8, 8, 0, 0, masked);
    console.run_frame();
    assert!(console.pixels().iter().all(|&p| p == 4));
}

#[test]
fn layers_then_submission_order() {
    let mut console = console(4, 1);
    let a = DrawOptions { layer: 5, ..Default::default() };
    let b = DrawOptions { layer: 1, ..Default::default() };

    console.draw_pixels(&[1, 1, 1], 3, 1, 0, 0, a);
    console.draw_pixels(&[2, 2, 2, 2], 4, 1, 0, 0, b);
    console.draw_pixels(&[3, 3], 2, 1, 2, 0, a);
    console.run_frame();

    assert_eq!(console.pixels(), &[1, 1, 3, 3]);
}

#[test]
fn resolution_reset_starts_from_index_zero() {
    let mut console = console(8, 8);
    console.draw_pixels(&[7; 64], 8, 8, 0, 0, DrawOptions::default());
    console.run_frame();

    console.display_mut().reset_resolution(4, 4);
    console.draw_pixels(&[2], 1, 1, 3, 3, DrawOptions::default());
    console.run_frame();

    assert_eq!(console.pixels().len(), 16);
    assert_eq!(at(&console, 3, 3), 2);
    assert_eq!(console.pixels().iter().filter(|&&p| p == 0).count(), 15);
}

// ============================================================================
// TILEMAP
// ============================================================================

#[test]
fn tilemap_rebuild_keeps_untouched_tiles() {
    let mut console = console(32, 32);
    console.update_sprite_at(5, &[1; SPRITE_PIXELS]);
    console.update_sprite_at(7, &[2; SPRITE_PIXELS]);

    console.tilemap_mut().update_tile_at(0, 0, 5, 0, -1);
    console.draw_tilemap(Rect::new(0, 0, 32, 32), 0, 0, DrawOptions::default());
    console.run_frame();
    assert_eq!(at(&console, 0, 0), 1);
    assert_eq!(at(&console, 24, 24), 0);

    console.tilemap_mut().update_tile_at(3, 3, 7, 0, -1);
    console.clear();
    console.draw_tilemap(Rect::new(0, 0, 32, 32), 0, 0, DrawOptions::default());
    console.run_frame();
    assert_eq!(at(&console, 7, 7), 1);
    assert_eq!(at(&console, 31, 31), 2);
    assert_eq!(at(&console, 16, 16), 0);
}

#[test]
fn scrolled_tilemap_sample() {
    let mut console = console(8, 8);
    console.update_sprite_at(0, &[3; SPRITE_PIXELS]);
    console.tilemap_mut().update_tile_at(1, 1, 0, 0, -1);

    console.draw_tilemap(Rect::new(4, 4, 8, 8), 0, 0, DrawOptions::default());
    console.run_frame();
    assert_eq!(at(&console, 3, 3), 0);
    assert_eq!(at(&console, 4, 4), 3);
    assert_eq!(at(&console, 7, 7), 3);
}

// ============================================================================
// SPRITES AND PERSISTENCE
// ============================================================================

#[test]
fn empty_sprite_reads_as_sentinel() {
    let console = console(8, 8);
    let mut buf = vec![42; 3];
    console.sprites().read_sprite_at(-1, &mut buf);
    assert_eq!(buf, vec![EMPTY; SPRITE_PIXELS]);
}

#[test]
fn duplicate_sprites_resolve_to_lowest_id() {
    let mut console = console(8, 8);
    let pixels: Vec<i32> = (0..SPRITE_PIXELS as i32).map(|i| i % 3).collect();
    console.update_sprite_at(9, &pixels);
    console.update_sprite_at(2, &pixels);
    assert_eq!(console.sprites().find_sprite(&pixels, true), Some(2));
}

#[test]
fn saved_game_reproduces_frame() {
    let mut console = console(32, 32);
    console.update_sprite_at(1, &[4; SPRITE_PIXELS]);
    console.tilemap_mut().update_tile_at(2, 1, 1, 1, -1);
    console.tilemap_mut().set_flip(2, 1, true, false);
    console.draw_tilemap(Rect::new(0, 0, 32, 32), 0, 0, DrawOptions::default());
    console.run_frame();
    let expected = console.pixels().to_vec();

    let json = console.save_game_data().unwrap();
    let mut restored = Console::new(&ConsoleConfig {
        display_width: 32,
        display_height: 32,
        ..Default::default()
    });
    restored.load_game_data(&json).unwrap();
    restored.draw_tilemap(Rect::new(0, 0, 32, 32), 0, 0, DrawOptions::default());
    restored.run_frame();

    assert_eq!(restored.pixels(), expected.as_slice());
    assert_eq!(at(&restored, 16, 8), 5);
}

#[test]
fn palette_growth_fills_with_mask() {
    let mut console = console(8, 8);
    console.colors_mut().set_total(20);
    assert_eq!(console.hex_colors().len(), 20);
    assert!(console.hex_colors()[16..].iter().all(|c| c == "#FF00FF"));
}
