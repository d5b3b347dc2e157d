//! Tray icon rendering: threshold colors, the render-on-delta policy, and
//! the single-slot resource lifecycle.

use tiny_skia::Pixmap;

use crate::glyphs;

/// Icon edge length in pixels.
pub const ICON_SIZE: u32 = 32;

/// Minimum temperature change that justifies re-rendering the icon.
pub const RENDER_DELTA_C: f32 = 1.0;

const GREEN_MAX_C: f32 = 60.0;
const YELLOW_MAX_C: f32 = 75.0;
const ORANGE_MAX_C: f32 = 90.0;

const COLOR_GRAY: u32 = 0x9A9A9A;

/// Temperature color band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Green,
    Yellow,
    Orange,
    Red,
}

impl Band {
    pub fn color(self) -> u32 {
        match self {
            Band::Green => 0x2ECC40,
            Band::Yellow => 0xF5C518,
            Band::Orange => 0xFF851B,
            Band::Red => 0xE03131,
        }
    }
}

/// Maps a temperature to its band (inclusive upper bounds).
pub fn band(temp_c: f32) -> Band {
    if temp_c <= GREEN_MAX_C {
        Band::Green
    } else if temp_c <= YELLOW_MAX_C {
        Band::Yellow
    } else if temp_c <= ORANGE_MAX_C {
        Band::Orange
    } else {
        Band::Red
    }
}

/// A rendered icon bitmap, ARGB32 in network byte order (the tray
/// protocol's pixmap layout).
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedIcon {
    pub width: i32,
    pub height: i32,
    pub argb: Vec<u8>,
}

/// Renders `text` centered on a transparent square. Deterministic for
/// identical inputs.
pub fn render(text: &str, color: u32) -> RenderedIcon {
    let mut pixmap = Pixmap::new(ICON_SIZE, ICON_SIZE).expect("Failed to create pixmap");

    let n = text.chars().count().max(1);
    let gap = 2.0;
    let glyph_h = 22.0;
    let avail = ICON_SIZE as f32 - 2.0;
    let glyph_w = (((avail - (n as f32 - 1.0) * gap) / n as f32).floor()).min(14.0);
    let total = glyphs::text_width(n, glyph_w, gap);
    let x = (ICON_SIZE as f32 - total) / 2.0;
    let y = (ICON_SIZE as f32 - glyph_h) / 2.0;

    glyphs::draw_text(&mut pixmap, x, y, text, glyph_w, glyph_h, gap, color);

    RenderedIcon {
        width: ICON_SIZE as i32,
        height: ICON_SIZE as i32,
        argb: to_argb(&pixmap),
    }
}

fn to_argb(pixmap: &Pixmap) -> Vec<u8> {
    let mut argb = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        argb.extend_from_slice(&[px.alpha(), px.red(), px.green(), px.blue()]);
    }
    argb
}

/// Single-slot owner of the live icon resource. Installing a replacement
/// releases the previous resource exactly once; `release` covers shutdown.
pub struct IconSlot<R> {
    current: Option<R>,
}

impl<R> IconSlot<R> {
    pub fn new() -> Self {
        Self { current: None }
    }

    pub fn install(&mut self, icon: R) {
        // The previous resource drops here, and nowhere else.
        self.current = Some(icon);
    }

    pub fn release(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&R> {
        self.current.as_ref()
    }
}

/// What the icon currently shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayValue {
    Temperature(f32),
    Unavailable,
    Error,
}

/// Owns the rendered icon resource and the render-on-delta policy.
pub struct IconState {
    slot: IconSlot<RenderedIcon>,
    shown: Option<DisplayValue>,
}

impl IconState {
    pub fn new() -> Self {
        Self {
            slot: IconSlot::new(),
            shown: None,
        }
    }

    /// Re-renders when the value moved at least [`RENDER_DELTA_C`] from the
    /// last rendered temperature, or the display state changed. Returns the
    /// new icon when one was produced.
    pub fn update(&mut self, value: DisplayValue) -> Option<RenderedIcon> {
        if !self.needs_render(&value) {
            return None;
        }

        let icon = match value {
            DisplayValue::Temperature(t) => {
                render(&format!("{}", t.round() as i32), band(t).color())
            }
            DisplayValue::Unavailable => render("--", COLOR_GRAY),
            DisplayValue::Error => render("!", Band::Red.color()),
        };

        self.shown = Some(value);
        self.slot.install(icon.clone());
        Some(icon)
    }

    fn needs_render(&self, value: &DisplayValue) -> bool {
        match (&self.shown, value) {
            (None, _) => true,
            (Some(DisplayValue::Temperature(last)), DisplayValue::Temperature(new)) => {
                (new - last).abs() >= RENDER_DELTA_C
            }
            (Some(prev), new) => prev != new,
        }
    }

    /// Releases the cached icon resource (shutdown path).
    pub fn release(&mut self) {
        self.slot.release();
        self.shown = None;
    }

    pub fn current(&self) -> Option<&RenderedIcon> {
        self.slot.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_band_boundaries() {
        assert_eq!(band(60.0), Band::Green);
        assert_eq!(band(60.1), Band::Yellow);
        assert_eq!(band(75.0), Band::Yellow);
        assert_eq!(band(75.1), Band::Orange);
        assert_eq!(band(90.0), Band::Orange);
        assert_eq!(band(90.1), Band::Red);
    }

    #[test]
    fn test_delta_rule() {
        let mut state = IconState::new();
        let rendered: Vec<bool> = [50.0, 50.4, 50.9, 52.0]
            .iter()
            .map(|&t| state.update(DisplayValue::Temperature(t)).is_some())
            .collect();
        assert_eq!(rendered, vec![true, false, false, true]);
    }

    #[test]
    fn test_error_state_renders_and_reverts() {
        let mut state = IconState::new();
        assert!(state.update(DisplayValue::Temperature(50.0)).is_some());
        assert!(state.update(DisplayValue::Error).is_some());
        // Repeated failures do not redraw.
        assert!(state.update(DisplayValue::Error).is_none());
        // Recovery reverts even inside the delta window.
        assert!(state.update(DisplayValue::Temperature(50.2)).is_some());
    }

    #[test]
    fn test_unavailable_rendered_once() {
        let mut state = IconState::new();
        assert!(state.update(DisplayValue::Unavailable).is_some());
        assert!(state.update(DisplayValue::Unavailable).is_none());
    }

    #[test]
    fn test_render_is_deterministic() {
        assert_eq!(render("47", 0x2ECC40), render("47", 0x2ECC40));
        assert_ne!(render("47", 0x2ECC40), render("48", 0x2ECC40));
    }

    #[test]
    fn test_render_hot_temperature_fits() {
        let icon = render("104", Band::Red.color());
        assert_eq!(icon.width, ICON_SIZE as i32);
        assert_eq!(icon.argb.len(), (ICON_SIZE * ICON_SIZE * 4) as usize);
        assert!(icon.argb.iter().any(|&b| b != 0));
    }

    struct Guard(Rc<Cell<u32>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_slot_releases_previous_exactly_once() {
        let drops = Rc::new(Cell::new(0));
        let mut slot = IconSlot::new();

        slot.install(Guard(drops.clone()));
        assert_eq!(drops.get(), 0);

        // Three replacements release exactly three previous resources.
        slot.install(Guard(drops.clone()));
        slot.install(Guard(drops.clone()));
        slot.install(Guard(drops.clone()));
        assert_eq!(drops.get(), 3);

        slot.release();
        assert_eq!(drops.get(), 4);

        // Releasing an empty slot frees nothing.
        slot.release();
        assert_eq!(drops.get(), 4);
    }
}
