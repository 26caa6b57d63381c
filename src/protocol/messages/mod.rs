//! Concrete message types, grouped by id namespace.
//!
//! The full protocol carries hundreds of these; each is a mechanical
//! read/write pair over the primitive codec. This catalog holds the set
//! the emulator actually speaks today. Adding a message means declaring
//! its struct, implementing [`crate::protocol::Message`], and adding one
//! line to the namespace's `register` function.

pub mod connect;
pub mod game;
pub mod types;
