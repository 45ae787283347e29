pub mod controller;
pub mod decoder;
pub mod input_channel;

pub use controller::ControllerLink;
pub use decoder::{decode_line, DecodedCommand};
pub use input_channel::InputChannel;
