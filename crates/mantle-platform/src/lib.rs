mod fsutil;
mod paths;

pub use fsutil::write_atomic;
pub use paths::{AppPaths, AppPathsError};
