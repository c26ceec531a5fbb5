pub mod model;
pub mod registration;
pub mod renderer;
pub mod storage;
