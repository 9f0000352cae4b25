mod errors;

pub mod controller;
pub mod core;
pub mod events;
pub mod sem;
pub mod shelf;
pub mod worker;

pub use errors::SimError;

pub const MAX_ITEMS: usize = core::MAX_ITEMS;

#[cfg(test)]
mod tests;
