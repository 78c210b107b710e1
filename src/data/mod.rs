pub mod buffer;
pub mod signal;
