use anyhow::{Context, Result};
use std::path::Path;

use crate::render::canvas::Canvas;

/// Encode a canvas as an 8-bit RGBA PNG.
pub fn encode_png(canvas: &Canvas) -> Result<Vec<u8>> {
    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, canvas.width(), canvas.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().context("Failed to write PNG header")?;
        writer
            .write_image_data(canvas.pixels())
            .context("Failed to write PNG image data")?;
    }
    Ok(png_data)
}

pub fn write_png(canvas: &Canvas, path: &Path) -> Result<()> {
    let data = encode_png(canvas)?;
    std::fs::write(path, data)
        .with_context(|| format!("Failed to write image: {}", path.display()))?;
    log::info!(
        "Wrote {}x{} image to {}",
        canvas.width(),
        canvas.height(),
        path.display()
    );
    Ok(())
}
