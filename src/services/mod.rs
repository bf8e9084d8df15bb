pub mod code_generator;
pub mod room;

pub use code_generator::*;
pub use room::*;
