//! Seven-segment digits for stamping the year onto a frame.
//!
//! Each glyph is a set of straight strokes inside a cell whose height is
//! `0.72 * size` (roughly the cap height of a font at that size) and whose
//! width is half that. The origin is the left end of the baseline, as with
//! text placement.
//!
//! ```text
//!  aaa
//! f   b
//!  ggg
//! e   c
//!  ddd
//! ```

const A: u8 = 1 << 0;
const B: u8 = 1 << 1;
const C: u8 = 1 << 2;
const D: u8 = 1 << 3;
const E: u8 = 1 << 4;
const F: u8 = 1 << 5;
const G: u8 = 1 << 6;

/// Lit segments for `ch`, or `None` when it has no glyph.
pub fn segments(ch: char) -> Option<u8> {
    let mask = match ch {
        '0' => A | B | C | D | E | F,
        '1' => B | C,
        '2' => A | B | G | E | D,
        '3' => A | B | G | C | D,
        '4' => F | G | B | C,
        '5' => A | F | G | C | D,
        '6' => A | F | G | E | C | D,
        '7' => A | B | C,
        '8' => A | B | C | D | E | F | G,
        '9' => A | B | C | D | F | G,
        '-' => G,
        ' ' => 0,
        _ => return None,
    };
    Some(mask)
}

/// Metrics of the digit cell for a given text size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphMetrics {
    pub height: f32,
    pub width: f32,
    pub advance: f32,
    pub stroke_width: f32,
}

impl GlyphMetrics {
    pub fn for_size(size: f32) -> Self {
        let height = size * 0.72;
        let width = height * 0.5;
        Self {
            height,
            width,
            advance: width + size * 0.18,
            stroke_width: (size * 0.09).max(1.0),
        }
    }
}

/// Stroke outline of `text` with its baseline starting at `(x, y)`.
///
/// Characters without a glyph are skipped but still advance the pen.
pub fn text_path(text: &str, x: f32, y: f32, size: f32) -> Option<tiny_skia::Path> {
    let metrics = GlyphMetrics::for_size(size);
    let mut builder = tiny_skia::PathBuilder::new();

    for (i, ch) in text.chars().enumerate() {
        let mask = segments(ch).unwrap_or(0);
        let left = x + i as f32 * metrics.advance;
        let right = left + metrics.width;
        let top = y - metrics.height;
        let middle = y - metrics.height / 2.0;
        let bottom = y;

        let strokes = [
            (A, (left, top), (right, top)),
            (B, (right, top), (right, middle)),
            (C, (right, middle), (right, bottom)),
            (D, (left, bottom), (right, bottom)),
            (E, (left, middle), (left, bottom)),
            (F, (left, top), (left, middle)),
            (G, (left, middle), (right, middle)),
        ];
        for (segment, from, to) in strokes {
            if mask & segment != 0 {
                builder.move_to(from.0, from.1);
                builder.line_to(to.0, to.1);
            }
        }
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_light_expected_segments() {
        assert_eq!(segments('8').map(u8::count_ones), Some(7));
        assert_eq!(segments('1').map(u8::count_ones), Some(2));
        assert_eq!(segments('0').map(|m| m & G), Some(0));
        assert_eq!(segments('x'), None);
    }

    #[test]
    fn year_outline_sits_on_the_baseline() {
        let path = text_path("2021", 10.0, 100.0, 50.0).expect("digits produce strokes");
        let bounds = path.bounds();
        let metrics = GlyphMetrics::for_size(50.0);
        assert!((bounds.left() - 10.0).abs() < 1e-3);
        assert!((bounds.bottom() - 100.0).abs() < 1e-3);
        assert!((bounds.top() - (100.0 - metrics.height)).abs() < 1e-3);
        assert!((bounds.right() - (10.0 + 3.0 * metrics.advance + metrics.width)).abs() < 1e-3);
    }

    #[test]
    fn text_without_glyphs_has_no_outline() {
        assert!(text_path("", 0.0, 0.0, 10.0).is_none());
        assert!(text_path("  ", 0.0, 0.0, 10.0).is_none());
    }
}
