mod client;
mod connection;
mod constants;
mod errors;
mod event;
mod listener;
pub mod utils;

pub use client::*;
pub use connection::*;
pub use errors::*;
pub use event::*;
pub use listener::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
