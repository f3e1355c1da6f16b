//! Inventory synchronization engine
//!
//! ## Architecture
//!
//! 1. **topology** - per-cycle node tree (vcenter down to datastores and VMs)
//! 2. **fetcher** - fills one target's tree, one worker per cluster
//! 3. **snapshot** - flattens trees into uuid-keyed records
//! 4. **store** - lock-free publication of complete generations
//! 5. **synchronizer** - the periodic control loop tying it together

pub mod fetcher;
pub mod snapshot;
pub mod store;
pub mod synchronizer;
pub mod topology;

pub use fetcher::TopologyFetcher;
pub use snapshot::{
    ClusterRecord, DatacenterRecord, DatastoreRecord, HostChildRecord, HostRecord, Inventory,
    VcenterRecord, VmRecord,
};
pub use store::{Generation, InventoryStore};
pub use synchronizer::{CycleReport, InventorySynchronizer};
