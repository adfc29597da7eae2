//! Type definitions

pub mod allocation;
pub mod driver;
pub mod location;
pub mod messages;
pub mod pricing;
pub mod ride;
pub mod rider;

pub use allocation::*;
pub use driver::*;
pub use location::*;
pub use messages::*;
pub use pricing::*;
pub use ride::*;
pub use rider::*;
