pub mod dataset;
pub mod execution;
pub mod message;
pub mod render;
pub mod response;
