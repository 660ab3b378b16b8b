//! Instruction handlers
//!
//! Every balance or roster change runs inside one store transaction whose
//! guards are re-read at commit time.

pub mod admin;
pub mod player;
pub mod wallet;

pub use admin::*;
pub use player::*;
pub use wallet::*;
