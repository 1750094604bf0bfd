//! Processing blocks: verification, acceptance, rejection and building.
//!
//! Each verified block registers the [`Diff`](crate::state::Diff) it produces
//! in the [`Backend`] index, keyed by block id. A proposal block additionally
//! pre-builds its commit and abort children; those are known by id right away
//! but only get state once they are verified themselves.

mod acceptor;
mod backend;
mod builder;
mod manager;
mod rejector;
mod verifier;

pub use backend::{Backend, BlockState, ProposalOptions};
pub use manager::Manager;
