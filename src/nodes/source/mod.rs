mod injector;
mod sine;

pub use injector::*;
pub use sine::*;
