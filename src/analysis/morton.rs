//! Z-order (Morton) mapping between window indices and canvas pixels.
//!
//! Even bits of an index form `x`, odd bits form `y`. Consecutive indices stay
//! close together on the canvas, so a signal that repeats every 2^k windows
//! lines up into visible blocks.

use serde::Serialize;

const AXIS_BITS: u32 = 32;

/// Deinterleave `index` into an `(x, y)` pixel coordinate.
pub fn coordinates_of(index: u64) -> (u32, u32) {
    let mut x = 0u32;
    let mut y = 0u32;
    for k in 0..AXIS_BITS {
        x |= (((index >> (2 * k)) & 1) as u32) << k;
        y |= (((index >> (2 * k + 1)) & 1) as u32) << k;
    }
    (x, y)
}

/// Interleave `x` and `y` back into a window index.
pub fn index_of(x: u32, y: u32) -> u64 {
    let mut index = 0u64;
    for k in 0..AXIS_BITS {
        index |= (((x >> k) & 1) as u64) << (2 * k);
        index |= (((y >> k) & 1) as u64) << (2 * k + 1);
    }
    index
}

/// Power-of-two canvas just large enough to hold every window.
///
/// The extra bit of an odd bit count goes to `x`, so canvases are either
/// square or twice as wide as they are tall.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CanvasGeometry {
    pub width: u32,
    pub height: u32,
}

impl CanvasGeometry {
    pub fn for_windows(total_windows: u64) -> Self {
        let total_bits = ceil_log2(total_windows);
        let x_bits = total_bits.div_ceil(2);
        let y_bits = total_bits / 2;
        Self {
            width: 1 << x_bits,
            height: 1 << y_bits,
        }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Pixel for a (possibly shifted) window index, `None` when it falls off the canvas.
    pub fn locate(&self, adjusted_index: i64) -> Option<(u32, u32)> {
        if adjusted_index < 0 {
            return None;
        }
        let (x, y) = coordinates_of(adjusted_index as u64);
        self.contains(x, y).then_some((x, y))
    }
}

fn ceil_log2(n: u64) -> u32 {
    if n <= 1 {
        0
    } else {
        u64::BITS - (n - 1).leading_zeros()
    }
}
