//! Core scalar types shared by the whole crate

pub mod time;

pub use time::{approximately_equal, essentially_equal, Time, DEFAULT_TIME_TOLERANCE};
