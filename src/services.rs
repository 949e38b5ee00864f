pub mod board;
pub mod codes;
pub mod dependencies;
pub mod mutator;
pub mod normalizer;
pub mod scheduler;
pub mod service_hours;
pub mod session;
pub mod stats;
pub mod tree;
