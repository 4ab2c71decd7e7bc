#![deny(dead_code)]
#![deny(unused_imports)]

pub mod basis;
pub mod construction;
pub mod estimate;
pub mod inference;
pub mod model;
