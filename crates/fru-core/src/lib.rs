//! Discovery snapshot reconciliation for a hardware inventory.
//!
//! A collector submits a [`model::snapshot::DiscoverySnapshot`] holding the
//! raw list of devices it found. [`reconcile::Reconciler`] folds that list
//! into the persistent set of [`model::device::Device`] records: one device
//! per Redfish discovery URI, with parent links resolved from reported
//! parent serial numbers.

pub mod config;
pub mod db;
pub mod error;
pub mod ident;
pub mod lock;
pub mod model;
pub mod reconcile;
pub mod store;
