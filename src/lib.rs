//! Release tracker for serialized fiction.
//!
//! Users subscribe to titles from a remote catalog, record how far they have
//! read, and get pinged in a shared channel when a new chapter appears.
//! [`service::WatchService`] answers interactive requests and
//! [`checker::UpdateChecker`] runs the periodic new-chapter cycle.

pub mod action;
pub mod cache;
pub mod catalog;
pub mod checker;
pub mod config;
pub mod error;
pub mod notify;
pub mod pagination;
pub mod progress;
pub mod service;
pub mod storage;

#[cfg(test)]
mod testing;
