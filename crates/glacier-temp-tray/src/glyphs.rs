//! Segment-glyph rendering for the tray icon.
//!
//! Glyphs are filled rectangles in a seven-segment arrangement, so the icon
//! needs no font asset. Supported characters: `0`-`9`, `-`, `!`.

use tiny_skia::{Color, Paint, Pixmap, Rect, Transform};

const SEG_A: u8 = 0x01; // top
const SEG_B: u8 = 0x02; // top right
const SEG_C: u8 = 0x04; // bottom right
const SEG_D: u8 = 0x08; // bottom
const SEG_E: u8 = 0x10; // bottom left
const SEG_F: u8 = 0x20; // top left
const SEG_G: u8 = 0x40; // middle

fn segment_bits(ch: char) -> Option<u8> {
    Some(match ch {
        '0' => SEG_A | SEG_B | SEG_C | SEG_D | SEG_E | SEG_F,
        '1' => SEG_B | SEG_C,
        '2' => SEG_A | SEG_B | SEG_G | SEG_E | SEG_D,
        '3' => SEG_A | SEG_B | SEG_G | SEG_C | SEG_D,
        '4' => SEG_F | SEG_B | SEG_G | SEG_C,
        '5' => SEG_A | SEG_F | SEG_G | SEG_C | SEG_D,
        '6' => SEG_A | SEG_F | SEG_G | SEG_E | SEG_C | SEG_D,
        '7' => SEG_A | SEG_B | SEG_C,
        '8' => SEG_A | SEG_B | SEG_C | SEG_D | SEG_E | SEG_F | SEG_G,
        '9' => SEG_A | SEG_B | SEG_C | SEG_D | SEG_F | SEG_G,
        '-' => SEG_G,
        _ => return None,
    })
}

/// Draws a filled rectangle in 0xRRGGBB.
pub fn fill_rect(pixmap: &mut Pixmap, x: f32, y: f32, w: f32, h: f32, color: u32) {
    let r = ((color >> 16) & 0xFF) as f32 / 255.0;
    let g = ((color >> 8) & 0xFF) as f32 / 255.0;
    let b = (color & 0xFF) as f32 / 255.0;

    let mut paint = Paint::default();
    paint.set_color(Color::from_rgba(r, g, b, 1.0).unwrap());

    if let Some(rect) = Rect::from_xywh(x, y, w, h) {
        pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    }
}

/// Draws one glyph into a `w` x `h` cell at (`x`, `y`). Unknown characters
/// draw nothing.
pub fn draw_glyph(pixmap: &mut Pixmap, x: f32, y: f32, w: f32, h: f32, ch: char, color: u32) {
    let t = (h * 0.16).max(2.0);

    if ch == '!' {
        let bx = x + (w - t) / 2.0;
        fill_rect(pixmap, bx, y, t, h * 0.62, color);
        fill_rect(pixmap, bx, y + h - t, t, t, color);
        return;
    }

    let Some(bits) = segment_bits(ch) else { return };
    let half = h / 2.0;

    if bits & SEG_A != 0 {
        fill_rect(pixmap, x, y, w, t, color);
    }
    if bits & SEG_B != 0 {
        fill_rect(pixmap, x + w - t, y, t, half, color);
    }
    if bits & SEG_C != 0 {
        fill_rect(pixmap, x + w - t, y + half, t, half, color);
    }
    if bits & SEG_D != 0 {
        fill_rect(pixmap, x, y + h - t, w, t, color);
    }
    if bits & SEG_E != 0 {
        fill_rect(pixmap, x, y + half, t, half, color);
    }
    if bits & SEG_F != 0 {
        fill_rect(pixmap, x, y, t, half, color);
    }
    if bits & SEG_G != 0 {
        fill_rect(pixmap, x, y + half - t / 2.0, w, t, color);
    }
}

/// Draws `text` left to right with a fixed advance.
pub fn draw_text(
    pixmap: &mut Pixmap,
    x: f32,
    y: f32,
    text: &str,
    glyph_w: f32,
    glyph_h: f32,
    gap: f32,
    color: u32,
) {
    let mut cursor = x;
    for ch in text.chars() {
        draw_glyph(pixmap, cursor, y, glyph_w, glyph_h, ch, color);
        cursor += glyph_w + gap;
    }
}

/// Total width of `n` glyphs with `gap` spacing.
pub fn text_width(n: usize, glyph_w: f32, gap: f32) -> f32 {
    if n == 0 {
        0.0
    } else {
        n as f32 * glyph_w + (n as f32 - 1.0) * gap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit_pixels(pixmap: &Pixmap) -> usize {
        pixmap.pixels().iter().filter(|p| p.alpha() > 0).count()
    }

    #[test]
    fn test_glyphs_produce_pixels() {
        for ch in "0123456789-!".chars() {
            let mut pixmap = Pixmap::new(16, 24).unwrap();
            draw_glyph(&mut pixmap, 1.0, 1.0, 12.0, 20.0, ch, 0xFFFFFF);
            assert!(lit_pixels(&pixmap) > 0, "glyph {ch:?} drew nothing");
        }
    }

    #[test]
    fn test_unknown_glyph_draws_nothing() {
        let mut pixmap = Pixmap::new(16, 24).unwrap();
        draw_glyph(&mut pixmap, 1.0, 1.0, 12.0, 20.0, 'x', 0xFFFFFF);
        assert_eq!(lit_pixels(&pixmap), 0);
    }

    #[test]
    fn test_drawing_is_deterministic() {
        let mut a = Pixmap::new(32, 32).unwrap();
        let mut b = Pixmap::new(32, 32).unwrap();
        draw_text(&mut a, 2.0, 5.0, "47", 13.0, 22.0, 2.0, 0x2ECC40);
        draw_text(&mut b, 2.0, 5.0, "47", 13.0, 22.0, 2.0, 0x2ECC40);
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn test_eight_covers_more_than_one() {
        let mut eight = Pixmap::new(16, 24).unwrap();
        let mut one = Pixmap::new(16, 24).unwrap();
        draw_glyph(&mut eight, 1.0, 1.0, 12.0, 20.0, '8', 0xFFFFFF);
        draw_glyph(&mut one, 1.0, 1.0, 12.0, 20.0, '1', 0xFFFFFF);
        assert!(lit_pixels(&eight) > lit_pixels(&one));
    }

    #[test]
    fn test_text_width() {
        assert_eq!(text_width(0, 13.0, 2.0), 0.0);
        assert_eq!(text_width(1, 13.0, 2.0), 13.0);
        assert_eq!(text_width(2, 13.0, 2.0), 28.0);
    }
}
