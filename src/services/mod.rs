pub mod azure;
pub mod log;
pub mod store;

pub use azure::*;
pub use log::*;
pub use store::*;
