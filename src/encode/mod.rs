pub mod json;
pub mod png;
