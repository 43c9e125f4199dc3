mod connection;
mod frame;

pub use connection::Connection;
pub use frame::RequestFrame;
