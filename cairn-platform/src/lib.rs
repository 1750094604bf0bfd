//! Block and transaction execution core of the Cairn platform chain.
//!
//! Verifies, executes, accepts and builds platform-chain blocks against a
//! tree of uncommitted state diffs rooted at the last accepted block.

pub mod atomic;
pub mod block;
pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
pub mod mempool;
pub mod reward;
pub mod state;

#[cfg(test)]
mod testing;

pub use block::Manager;
pub use error::PlatformError;
