//! Client session context

pub mod context;
pub mod ports;

pub use context::SessionContext;
pub use ports::ProfileApi;
