pub mod difference;
pub mod loader;
pub mod renderer;
pub mod smart_pixel;
pub mod statistics;
