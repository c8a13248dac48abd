pub mod cur;
pub mod eval;
pub mod neighborhood;
pub mod sparse;
pub mod svd;
mod utils;

pub use utils::nan_to_zero;
pub use utils::FloatOps;
pub use utils::NumericOps;
