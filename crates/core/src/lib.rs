#![forbid(unsafe_code)]

pub mod model;
pub mod score;
pub mod time;
pub mod timeline;

pub use time::Clock;
