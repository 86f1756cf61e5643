pub mod compare;
pub mod core;
pub mod key;
pub mod merge;
pub mod run;


pub use self::compare::*;
pub use self::core::*;
pub use self::key::*;
pub use self::merge::*;
pub use self::run::*;
