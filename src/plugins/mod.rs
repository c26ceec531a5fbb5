pub mod bridge;
pub mod transformation;
