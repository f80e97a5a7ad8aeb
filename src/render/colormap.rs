use crate::analysis::cache::Maxima;
use crate::analysis::power::PowerSample;

pub const TABLE_LEN: usize = 256;
const MIDPOINT: usize = 128;

/// 256-entry colour lookup, index 0 for the lowest value and 255 for the highest.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorTable {
    entries: Vec<[u8; 3]>,
}

impl ColorTable {
    /// Returns `None` unless exactly 256 entries are given.
    pub fn from_entries(entries: Vec<[u8; 3]>) -> Option<Self> {
        (entries.len() == TABLE_LEN).then_some(Self { entries })
    }

    /// Perceptually uniform magma ramp.
    pub fn magma() -> Self {
        let entries = (0..TABLE_LEN)
            .map(|i| {
                let (r, g, b) = magma(i as f32 / (TABLE_LEN - 1) as f32);
                [to_byte(r), to_byte(g), to_byte(b)]
            })
            .collect();
        Self { entries }
    }

    pub fn grayscale() -> Self {
        let entries = (0..TABLE_LEN).map(|i| [i as u8; 3]).collect();
        Self { entries }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "magma" => Some(Self::magma()),
            "gray" | "grey" | "grayscale" => Some(Self::grayscale()),
            _ => None,
        }
    }

    pub fn entry(&self, index: usize) -> [u8; 3] {
        self.entries[index.min(TABLE_LEN - 1)]
    }

    /// Look up a value already normalized to `[0, 1]`. NaN lands on the midpoint.
    pub fn lookup(&self, normalized: f32) -> [u8; 3] {
        if normalized.is_nan() {
            return self.entries[MIDPOINT];
        }
        let index = (normalized.clamp(0.0, 1.0) * 255.0).floor() as usize;
        self.entries[index]
    }

    /// Normalize against `[min, max]` then look up. An empty range lands on the midpoint.
    pub fn lookup_range(&self, value: f32, min: f32, max: f32) -> [u8; 3] {
        if !(max > min) {
            return self.entries[MIDPOINT];
        }
        self.lookup((value - min) / (max - min))
    }
}

/// Polynomial fit of matplotlib's magma map; `t` in `[0, 1]`.
fn magma(t: f32) -> (f32, f32, f32) {
    const C: [[f32; 3]; 7] = [
        [18.655_705, -11.489_774, -5.601_962],
        [-50.768_524, 29.046_583, 4.234_153],
        [52.176_14, -27.943_607, 12.944_169],
        [-27.668_734, 14.264_731, -13.649_213],
        [8.353_717, -3.577_72, 0.314_468],
        [0.251_660_54, 0.677_523_2, 2.494_026_6],
        [-0.002_136_485, -0.000_749_655, -0.005_386_128],
    ];
    let mut rgb = C[0];
    for row in &C[1..] {
        for (channel, coeff) in rgb.iter_mut().zip(row) {
            *channel = channel.mul_add(t, *coeff);
        }
    }
    (rgb[0], rgb[1], rgb[2])
}

fn to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Turns a window's power into an RGBA pixel given the normalizing maxima.
pub trait ColorMapper {
    fn color(&self, sample: &PowerSample, maxima: &Maxima) -> [u8; 4];
}

/// Mono power through a colour table, band power straight onto RGB.
#[derive(Clone, Debug)]
pub struct PowerPalette {
    pub table: ColorTable,
}

impl PowerPalette {
    pub fn new(table: ColorTable) -> Self {
        Self { table }
    }
}

impl Default for PowerPalette {
    fn default() -> Self {
        Self::new(ColorTable::magma())
    }
}

impl ColorMapper for PowerPalette {
    fn color(&self, sample: &PowerSample, maxima: &Maxima) -> [u8; 4] {
        match (*sample, *maxima) {
            (PowerSample::Mono(value), Maxima::Mono(max)) => {
                let [r, g, b] = self.table.lookup_range(value, 0.0, max);
                [r, g, b, 255]
            }
            (PowerSample::Bands { low, mid, high }, Maxima::Bands([max_low, max_mid, max_high])) => [
                channel(low, max_low),
                channel(mid, max_mid),
                channel(high, max_high),
                255,
            ],
            _ => {
                let [r, g, b] = self.table.entry(MIDPOINT);
                [r, g, b, 255]
            }
        }
    }
}

fn channel(value: f32, max: f32) -> u8 {
    let normalized = value / max;
    if normalized.is_nan() {
        return 0;
    }
    (normalized.clamp(0.0, 1.0) * 255.0) as u8
}
