#![allow(dead_code)]

pub mod strategies;
pub mod tasks;

pub use strategies::*;
pub use tasks::*;
