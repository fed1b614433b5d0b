//! Business logic services

pub mod cleaner;
pub mod dashboard;
pub mod dedup;
pub mod identity;
pub mod normalize;
pub mod pipeline;
pub mod resolver;
pub mod retry;
pub mod snapshot;
pub mod store;
pub mod validator;
