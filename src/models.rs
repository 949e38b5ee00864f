pub mod board;
pub mod catalog;
pub mod node;
pub mod patch;
pub mod snapshot;
pub mod status;
pub mod wire;
