pub mod bridge;
pub mod common;
pub mod delivery;
pub mod server;
pub mod session;
