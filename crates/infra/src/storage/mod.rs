//! Avatar object storage

pub mod local;

pub use local::LocalObjectStore;
