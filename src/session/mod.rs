pub mod identity;
pub mod manager;


pub use identity::*;
pub use manager::*;
