mod filter;
mod gain;
mod mixer;

pub use filter::*;
pub use gain::*;
pub use mixer::*;
