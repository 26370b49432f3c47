pub mod interpolation;
pub mod models;
pub mod playback;
pub mod sequence;
pub mod settings;
