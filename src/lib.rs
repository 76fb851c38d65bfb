pub mod config;
pub mod error;
pub mod similarity;
pub mod graph;
pub mod extraction;
pub mod disambiguation;
pub mod resolve;
pub mod merge;
pub mod update;

pub use config::Config;
pub use error::{MedkgError, Result};
pub use graph::{Edge, EdgeKey, EntityType, GraphStore, Node, NodeId, RelationType};
pub use update::{RunReport, UpdateController};
