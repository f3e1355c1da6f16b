//! vROps inventory synchronization
//!
//! A background synchronizer periodically rebuilds the vCenter topology
//! (datacenters, clusters, hosts, datastores, VMs) of every configured vROps
//! target and publishes it as one immutable generation. Metric collectors read
//! the current generation without locking and use the bulk query helpers to
//! fetch stats and properties for the uuids it contains.

pub mod collectors;
pub mod config;
pub mod context;
pub mod inventory;
pub mod server;
pub mod utils;
pub mod vrops;

#[cfg(test)]
mod testing;
