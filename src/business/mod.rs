pub mod courier;
pub mod orchestrator;
pub mod pickup;
pub mod rejection;
pub mod transformation;
pub mod validation;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use courier::*;
pub use orchestrator::*;
pub use pickup::*;
pub use rejection::*;
pub use transformation::*;
pub use validation::*;
pub use workflow::*;
