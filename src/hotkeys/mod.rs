pub mod events;

#[cfg(test)]
mod tests;

pub use events::*;
