pub mod accrual;
pub mod solvency;

pub use accrual::*;
pub use solvency::*;
