mod ejector;
pub use ejector::*;
