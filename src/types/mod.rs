pub mod dependency;
pub mod operation;
pub mod performer;

pub use dependency::*;
pub use operation::*;
pub use performer::*;
