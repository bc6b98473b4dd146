pub mod analysis;
pub mod contract;
pub mod entity;
pub mod user;
