pub mod config;
pub mod error;
pub mod game;
pub mod gateway;
pub mod roster;
pub mod session;
pub mod timer;
pub mod types;
