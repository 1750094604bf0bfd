//! Storage abstraction for the Cairn platform chain.
//!
//! Provides the [`BatchWriter`](traits::BatchWriter) engine interface with an in-memory backend and
//! a [`ChainStore`](chain_store::ChainStore) that persists blocks, the last
//! accepted block id and per-entry ledger tables in atomic batches.

pub mod chain_store;
pub mod error;
pub mod memory;
pub mod traits;
