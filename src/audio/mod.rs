pub mod bands;
pub mod decode;
pub mod tempo;
