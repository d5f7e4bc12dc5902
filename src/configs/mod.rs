pub mod base;
pub mod logging;
pub mod session;

pub use base::*;
pub use logging::*;
pub use session::*;
