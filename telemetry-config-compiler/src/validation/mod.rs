mod endpoint;
mod ottl;
mod tls;

pub use endpoint::*;
pub use ottl::*;
pub use tls::*;
