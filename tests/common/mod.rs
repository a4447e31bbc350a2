#![allow(dead_code)]

pub mod builders;
pub mod handlers;
pub mod strategies;

#[allow(unused_imports)]
pub use builders::*;
#[allow(unused_imports)]
pub use handlers::*;
