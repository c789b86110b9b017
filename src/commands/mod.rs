pub mod gate;
pub mod sink;
