pub mod canvas;
pub mod colormap;
