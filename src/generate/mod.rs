pub mod core;

#[cfg(test)]
mod tests;

pub use self::core::*;
