//! Inventory, scene selection and topsApp pair preparation

pub mod inventory;
pub mod selector;
pub mod topsapp;
pub mod pair;

// Re-export main types
pub use inventory::{Inventory, InventoryMerger, InventorySummary, OrbitSummary};
pub use selector::{SceneSelector, SceneSource};
pub use topsapp::{ConfigDocument, ConfigDocumentBuilder, ConfigNode, TopsOverrides};
pub use pair::{OrbitPolicy, PairPreparer, PairRequest, PairWorkspace, PreparedPair};
