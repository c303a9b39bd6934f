pub mod config;
pub mod dn;
pub mod engine;
pub mod entry;
pub mod export;
pub mod filter;
pub mod host;
pub mod inventory;
pub mod io;
pub mod ldif;
pub mod normalize;
pub mod report;
pub mod stats;

pub mod prelude {
    pub use crate::config::InventoryConfig;
    pub use crate::engine::Engine;
    pub use crate::host::HostDescriptor;
    pub use crate::inventory::{Inventory, InventoryBuilder};
}
