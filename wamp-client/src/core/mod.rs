pub mod close;
pub mod error;
pub mod hash;
pub mod id;
pub mod roles;
pub mod types;
pub mod uri;
