pub mod classifier;
pub mod config;
pub mod controller;
pub mod insight;
pub mod summary;

pub use classifier::*;
pub use config::*;
pub use controller::*;
pub use insight::*;
pub use summary::*;
