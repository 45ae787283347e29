pub mod app;
pub mod overlay;


pub use app::*;
