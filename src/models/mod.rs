pub mod api;
pub mod room;
pub mod signaling;

pub use api::*;
pub use room::*;
pub use signaling::*;
