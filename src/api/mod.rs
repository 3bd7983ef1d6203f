pub mod client;
pub mod types;

pub use client::{HttpApiClient, MemberApi};
pub use types::*;
