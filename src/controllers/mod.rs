pub mod health;
pub mod websocket;

pub use health::*;
pub use websocket::*;
