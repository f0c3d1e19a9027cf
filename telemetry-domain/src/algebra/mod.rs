mod secret;
mod string;

pub use secret::*;
pub use string::*;
