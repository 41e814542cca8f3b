//! Command builders for the frames the engine sends

pub mod application;
pub mod storage;

pub use application::Aid;
