pub mod policy;
pub mod report;
pub mod schema;

pub use policy::*;
pub use report::*;
pub use schema::*;
