//! Shared type definitions for the Cairn platform chain.
//!
//! Blocks, transactions, UTXOs and stakers, plus the versioned codec that
//! gives every consensus-critical value a single byte encoding.

pub mod block;
pub mod codec;
pub mod constants;
pub mod error;
pub mod genesis;
pub mod primitives;
pub mod staker;
pub mod tx;
pub mod utxo;
