//! Weave deinterlacer
//!
//! A module emitting interlaced output draws only one field's lines
//! per frame. The deinterlacer fills the other parity's lines from the
//! previous field so callers always see a complete frame. Its saved
//! field is running state: the pipeline resets it whenever interlacing
//! transitions from off to on.

use ac_module::{DisplayRect, Surface};

#[derive(Debug, Default)]
pub struct Deinterlacer {
    /// Previous field's rows, rect-relative
    saved: Vec<Vec<u32>>,
}

impl Deinterlacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_state(&mut self) {
        self.saved.clear();
    }

    /// Weave `field` (0 = even lines drawn, 1 = odd) with the saved
    /// opposite field. Rows missing a saved counterpart are duplicated
    /// from the nearest drawn row.
    pub fn process(
        &mut self,
        surface: &mut Surface,
        rect: DisplayRect,
        line_widths: &[i32],
        field: u32,
    ) {
        let h = rect.h.max(0) as usize;
        let field = (field & 1) as usize;
        self.saved.resize(h, Vec::new());

        for row in 0..h {
            let y = (rect.y + row as i32) as u32;
            let w = line_widths
                .get((rect.y + row as i32) as usize)
                .copied()
                .filter(|&lw| lw > 0)
                .unwrap_or(rect.w) as usize;
            let x0 = rect.x as usize;

            if row % 2 == field {
                // Freshly drawn row: save it for the next field
                let line = &surface.line(y)[x0..x0 + w];
                self.saved[row].clear();
                self.saved[row].extend_from_slice(line);
            } else if !self.saved[row].is_empty() {
                let saved = &self.saved[row];
                let n = saved.len().min(w);
                surface.line_mut(y)[x0..x0 + n].copy_from_slice(&saved[..n]);
            } else if row > 0 {
                // No history yet: bob from the line above
                let prev = surface.line((rect.y + row as i32 - 1) as u32)
                    [x0..x0 + w]
                    .to_vec();
                surface.line_mut(y)[x0..x0 + w].copy_from_slice(&prev);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_module::PixelFormat;

    fn rect(h: i32) -> DisplayRect {
        DisplayRect { x: 0, y: 0, w: 4, h }
    }

    fn fill_row(s: &mut Surface, y: u32, v: u32) {
        s.line_mut(y)[..4].fill(v);
    }

    #[test]
    fn test_weave_fills_other_field() {
        let mut deint = Deinterlacer::new();
        let mut s = Surface::new(4, 4, PixelFormat::xrgb8888());

        // Even field drawn with 1s
        fill_row(&mut s, 0, 1);
        fill_row(&mut s, 2, 1);
        deint.process(&mut s, rect(4), &[], 0);

        // Odd field drawn with 2s; even rows should weave back the 1s
        let mut s2 = Surface::new(4, 4, PixelFormat::xrgb8888());
        fill_row(&mut s2, 1, 2);
        fill_row(&mut s2, 3, 2);
        deint.process(&mut s2, rect(4), &[], 1);

        assert_eq!(s2.line(0)[0], 1);
        assert_eq!(s2.line(1)[0], 2);
        assert_eq!(s2.line(2)[0], 1);
        assert_eq!(s2.line(3)[0], 2);
    }

    #[test]
    fn test_first_field_bobs() {
        let mut deint = Deinterlacer::new();
        let mut s = Surface::new(4, 4, PixelFormat::xrgb8888());
        fill_row(&mut s, 0, 7);
        fill_row(&mut s, 2, 9);
        deint.process(&mut s, rect(4), &[], 0);

        // No saved odd field: rows duplicate from above
        assert_eq!(s.line(1)[0], 7);
        assert_eq!(s.line(3)[0], 9);
    }

    #[test]
    fn test_clear_state_forgets_history() {
        let mut deint = Deinterlacer::new();
        let mut s = Surface::new(4, 2, PixelFormat::xrgb8888());
        fill_row(&mut s, 0, 5);
        deint.process(&mut s, rect(2), &[], 0);

        deint.clear_state();
        let mut s2 = Surface::new(4, 2, PixelFormat::xrgb8888());
        fill_row(&mut s2, 1, 3);
        deint.process(&mut s2, rect(2), &[], 1);
        // Row 0 had no saved even field after the reset; bob is
        // impossible for row 0 so it stays as the module left it
        assert_eq!(s2.line(0)[0], 0);
    }
}
