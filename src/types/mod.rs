//! Type definitions

pub mod batch;
pub mod columns;
pub mod dashboard;
pub mod entities;
pub mod messages;
pub mod submission;

pub use batch::*;
pub use columns::*;
pub use dashboard::*;
pub use entities::*;
pub use messages::*;
pub use submission::*;
