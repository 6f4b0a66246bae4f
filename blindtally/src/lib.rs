#[macro_use]
extern crate serde;

mod arbiter;
mod ballot;
mod blind;
mod board;
mod elgamal;
mod error;
mod group;
mod hash;
mod keyfiles;
mod messages;
mod registrar;
mod serde_hex;
mod session;
mod tally;
mod tallyer;
mod voter;

pub use arbiter::*;
pub use ballot::*;
pub use blind::*;
pub use board::*;
pub use elgamal::*;
pub use error::*;
pub use group::*;
pub use hash::*;
pub use keyfiles::*;
pub use messages::*;
pub use registrar::*;
pub use serde_hex::*;
pub use session::*;
pub use tally::*;
pub use tallyer::*;
pub use voter::*;

#[cfg(test)]
mod tests;
