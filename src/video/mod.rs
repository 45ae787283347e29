pub mod dispatcher;
pub mod engine;
pub mod ffmpeg_engine;
pub mod notification;
pub mod probe;
pub mod redraw;
pub mod wakeup;

pub use dispatcher::*;
pub use engine::*;
pub use ffmpeg_engine::FfmpegEngine;
pub use notification::*;
pub use redraw::*;
pub use wakeup::*;
