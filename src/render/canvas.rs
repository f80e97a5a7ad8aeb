use crate::analysis::morton::CanvasGeometry;

const BACKGROUND: [u8; 4] = [0, 0, 0, 255];

/// RGBA8 pixel buffer sized to a Morton canvas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Canvas {
    pub geometry: CanvasGeometry,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(geometry: CanvasGeometry) -> Self {
        let pixels = BACKGROUND
            .iter()
            .copied()
            .cycle()
            .take(geometry.pixel_count() * 4)
            .collect();
        Self { geometry, pixels }
    }

    pub fn width(&self) -> u32 {
        self.geometry.width
    }

    pub fn height(&self) -> u32 {
        self.geometry.height
    }

    /// Writes one pixel; coordinates outside the canvas are ignored.
    pub fn put(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if !self.geometry.contains(x, y) {
            return;
        }
        let idx = (y as usize * self.geometry.width as usize + x as usize) * 4;
        self.pixels[idx..idx + 4].copy_from_slice(&rgba);
    }

    pub fn get(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if !self.geometry.contains(x, y) {
            return None;
        }
        let idx = (y as usize * self.geometry.width as usize + x as usize) * 4;
        let mut rgba = [0u8; 4];
        rgba.copy_from_slice(&self.pixels[idx..idx + 4]);
        Some(rgba)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}
