pub mod codec;
pub mod common;
pub mod message;
