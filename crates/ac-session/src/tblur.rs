//! Temporal blur
//!
//! Blends each output frame with an accumulator of previous frames,
//! either as a fixed 50/50 mix or with a configurable accumulation
//! amount. Applied in place after the rest of the pipeline.

use ac_module::{DisplayRect, Surface};

#[derive(Debug)]
pub struct TemporalBlur {
    accum: Vec<u32>,
    width: usize,
    /// Accumulation weight of the previous mix, 0..=255; None selects
    /// the plain 50/50 blend
    amount: Option<u32>,
}

impl TemporalBlur {
    pub fn new(width: u32, height: u32, accum_amount: Option<u32>) -> Self {
        Self {
            accum: vec![0; (width * height) as usize],
            width: width as usize,
            amount: accum_amount.map(|a| a.min(255)),
        }
    }

    pub fn run(&mut self, surface: &mut Surface, rect: DisplayRect) {
        for row in 0..rect.h.max(0) {
            let y = (rect.y + row) as u32;
            let x0 = rect.x as usize;
            let w = rect.w.max(0) as usize;
            let line = &mut surface.line_mut(y)[x0..x0 + w];

            for (x, px) in line.iter_mut().enumerate() {
                let idx = (row as usize * self.width + x).min(self.accum.len() - 1);
                let prev = self.accum[idx];
                let mixed = match self.amount {
                    None => avg_pixels(prev, *px),
                    Some(a) => weigh_pixels(prev, *px, a),
                };
                self.accum[idx] = mixed;
                *px = mixed;
            }
        }
    }
}

/// Channel-wise average of two packed 8-bit-per-channel pixels
fn avg_pixels(a: u32, b: u32) -> u32 {
    ((a & 0xFEFEFEFE) >> 1) + ((b & 0xFEFEFEFE) >> 1) + (a & b & 0x01010101)
}

/// prev*amount/256 + cur*(256-amount)/256, per channel
fn weigh_pixels(prev: u32, cur: u32, amount: u32) -> u32 {
    let mut out = 0u32;
    for shift in [0u32, 8, 16, 24] {
        let p = (prev >> shift) & 0xFF;
        let c = (cur >> shift) & 0xFF;
        let m = (p * amount + c * (256 - amount)) >> 8;
        out |= m << shift;
    }
    out
}
