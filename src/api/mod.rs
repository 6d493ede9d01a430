pub mod health;
pub mod metrics;
pub mod pickups;
pub mod shipments;

pub use health::*;
pub use metrics::*;
pub use pickups::*;
pub use shipments::*;
