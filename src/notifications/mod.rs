pub mod dispatch;
pub mod platform;
pub mod registrar;


pub use dispatch::*;
pub use platform::*;
pub use registrar::*;
