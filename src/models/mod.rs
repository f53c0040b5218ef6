mod product;
mod transaction;

pub use product::*;
pub use transaction::*;
