pub mod enums;
pub mod error;
pub mod schema;
pub mod state;
pub mod utils;

#[cfg(test)]
#[path = "shared.test.rs"]
mod tests;
