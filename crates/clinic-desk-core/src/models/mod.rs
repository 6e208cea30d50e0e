//! Domain models for the clinic desk.

mod activity;
mod date_key;
mod visit;

pub use activity::*;
pub use date_key::*;
pub use visit::*;
