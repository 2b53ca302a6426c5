//! Shared library behind the `understory` CLI and `understoryd` daemon.

pub mod backup;
pub mod db;
pub mod error;
pub mod integrity;
pub mod jobs;
pub mod paths;

pub use db::{Database, Node, NodePatch, Settings};
pub use error::{Result, StoreError};
