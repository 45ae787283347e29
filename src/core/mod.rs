pub mod config;
pub mod playback_state;
pub mod time_format;


pub use config::*;
pub use playback_state::*;
pub use time_format::*;
