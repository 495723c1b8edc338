pub mod bank;
pub mod user_position;

pub use bank::*;
pub use user_position::*;
