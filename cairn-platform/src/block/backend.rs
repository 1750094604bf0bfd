//! Index of processing blocks and the state each one produces.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use cairn_types::block::{Block, BlockHeader};
use cairn_types::primitives::{Id, Timestamp};
use cairn_types::utxo::UtxoId;

use crate::error::PlatformError;
use crate::executor::AtomicEffects;
use crate::state::{Chain, Diff, State, Versions};

/// The two pre-built children of a verified proposal block.
#[derive(Debug, Clone)]
pub struct ProposalOptions {
    pub commit: Block,
    pub abort: Block,
    pub on_commit: Arc<Diff>,
    pub on_abort: Arc<Diff>,
    pub prefers_commit: bool,
}

/// A processing block.
///
/// `on_accept_state` is `None` for blocks that are known but not yet
/// verified, which is how pre-built commit and abort blocks start out.
#[derive(Debug, Clone)]
pub struct BlockState {
    pub block: Block,
    /// Chain time after applying the block.
    pub timestamp: Timestamp,
    pub on_accept_state: Option<Arc<Diff>>,
    pub effects: AtomicEffects,
}

#[derive(Debug, Default)]
struct Index {
    blocks: BTreeMap<Id, BlockState>,
    children: BTreeMap<Id, BTreeSet<Id>>,
    /// Keyed by proposal id. Outlives the proposal's own entry until one of
    /// its options is accepted.
    options: BTreeMap<Id, ProposalOptions>,
}

impl Index {
    fn insert(&mut self, entry: BlockState) {
        let id = entry.block.id();
        self.children
            .entry(entry.block.parent())
            .or_default()
            .insert(id);
        self.blocks.insert(id, entry);
    }

    /// `root` and every id registered below it.
    fn subtree(&self, root: Id) -> Vec<Id> {
        let mut ids = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            ids.push(id);
            if let Some(children) = self.children.get(&id) {
                stack.extend(children.iter().copied());
            }
        }
        ids
    }

    /// Remove `root` and everything registered below it.
    fn evict_subtree(&mut self, root: Id) -> usize {
        if let Some(entry) = self.blocks.get(&root) {
            let parent = entry.block.parent();
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.remove(&root);
                if siblings.is_empty() {
                    self.children.remove(&parent);
                }
            }
        }

        let mut evicted = 0;
        for id in self.subtree(root) {
            if self.blocks.remove(&id).is_some() {
                evicted += 1;
            }
            self.children.remove(&id);
            self.options.remove(&id);
        }
        evicted
    }
}

pub struct Backend {
    state: Arc<State>,
    index: RwLock<Index>,
}

impl Backend {
    pub fn new(state: Arc<State>) -> Self {
        Self {
            state,
            index: RwLock::new(Index::default()),
        }
    }

    pub fn state(&self) -> &Arc<State> {
        &self.state
    }

    pub fn get_block_state(&self, id: &Id) -> Result<Option<BlockState>, PlatformError> {
        Ok(self.index.read()?.blocks.get(id).cloned())
    }

    /// Whether `id` has been verified and still awaits a decision.
    pub fn is_processing(&self, id: &Id) -> Result<bool, PlatformError> {
        Ok(self
            .index
            .read()?
            .blocks
            .get(id)
            .is_some_and(|entry| entry.on_accept_state.is_some()))
    }

    pub fn len(&self) -> Result<usize, PlatformError> {
        Ok(self.index.read()?.blocks.len())
    }

    pub fn is_empty(&self) -> Result<bool, PlatformError> {
        Ok(self.len()? == 0)
    }

    /// A processing block, or one already written to the base state.
    pub fn get_block(&self, id: &Id) -> Result<Block, PlatformError> {
        if let Some(entry) = self.index.read()?.blocks.get(id) {
            return Ok(entry.block.clone());
        }
        let (block, _) = self.state.get_stateless_block(id)?;
        Ok(block)
    }

    /// Chain time as of `block`: its header time if it carries one, else the
    /// time cached when it was registered, else the base state's time.
    pub fn get_timestamp(&self, block: &Block) -> Result<Timestamp, PlatformError> {
        if let BlockHeader::Timed { time, .. } = block.header() {
            return Ok(*time);
        }
        if let Some(entry) = self.index.read()?.blocks.get(&block.id()) {
            return Ok(entry.timestamp);
        }
        self.state.timestamp()
    }

    pub fn insert(&self, entry: BlockState) -> Result<(), PlatformError> {
        self.index.write()?.insert(entry);
        Ok(())
    }

    /// Attach verified state to a block, registering it if it is not known yet.
    pub fn set_on_accept_state(
        &self,
        block: &Block,
        diff: Arc<Diff>,
        timestamp: Timestamp,
    ) -> Result<(), PlatformError> {
        let mut index = self.index.write()?;
        match index.blocks.get_mut(&block.id()) {
            Some(entry) => {
                entry.on_accept_state = Some(diff);
                entry.timestamp = timestamp;
            }
            None => index.insert(BlockState {
                block: block.clone(),
                timestamp,
                on_accept_state: Some(diff),
                effects: AtomicEffects::default(),
            }),
        }
        Ok(())
    }

    pub fn set_options(&self, id: &Id, options: ProposalOptions) -> Result<(), PlatformError> {
        let mut index = self.index.write()?;
        if !index.blocks.contains_key(id) {
            return Err(PlatformError::not_found(format!("block {}", hex::encode(id))));
        }
        index.options.insert(*id, options);
        Ok(())
    }

    /// The options of proposal `id`, kept until one of them is accepted.
    pub fn get_options(&self, id: &Id) -> Result<Option<ProposalOptions>, PlatformError> {
        Ok(self.index.read()?.options.get(id).cloned())
    }

    /// Whether any processing ancestor of `parent_id`, inclusive, consumed one
    /// of `inputs`.
    pub fn conflicts_with_ancestors(
        &self,
        parent_id: &Id,
        inputs: &BTreeSet<UtxoId>,
    ) -> Result<bool, PlatformError> {
        if inputs.is_empty() {
            return Ok(false);
        }
        let index = self.index.read()?;
        let mut cursor = *parent_id;
        while let Some(entry) = index.blocks.get(&cursor) {
            if !entry.effects.inputs.is_disjoint(inputs) {
                return Ok(true);
            }
            cursor = entry.block.parent();
        }
        Ok(false)
    }

    /// Accept `id`. `commit` receives its entry and every block in the
    /// sibling subtrees that lose to it, and must persist the decision. The
    /// index only changes once `commit` succeeds, and readers wait for both.
    ///
    /// Returns the number of evicted blocks. The accepted block's own
    /// children stay.
    pub fn accept<F>(&self, id: &Id, commit: F) -> Result<usize, PlatformError>
    where
        F: FnOnce(&BlockState, &[Block]) -> Result<(), PlatformError>,
    {
        let mut index = self.index.write()?;
        let entry = index
            .blocks
            .get(id)
            .ok_or_else(|| PlatformError::not_found(format!("block {}", hex::encode(id))))?;
        let parent = entry.block.parent();

        let siblings: Vec<Id> = index
            .children
            .get(&parent)
            .map(|set| set.iter().filter(|s| *s != id).copied().collect())
            .unwrap_or_default();
        let conflicting: Vec<Block> = siblings
            .iter()
            .flat_map(|sibling| index.subtree(*sibling))
            .filter_map(|loser| index.blocks.get(&loser).map(|e| e.block.clone()))
            .collect();

        commit(entry, &conflicting)?;

        index.blocks.remove(id);
        index.children.remove(&parent);
        index.options.remove(&parent);
        let mut evicted = 0;
        for sibling in siblings {
            evicted += index.evict_subtree(sibling);
        }
        if evicted > 0 {
            tracing::debug!(
                id = hex::encode(id),
                evicted,
                "evicted blocks conflicting with accepted block"
            );
        }
        Ok(evicted)
    }

    /// Drop `id` and all of its descendants.
    pub fn reject(&self, id: &Id) -> Result<usize, PlatformError> {
        Ok(self.index.write()?.evict_subtree(*id))
    }
}

impl Versions for Backend {
    fn get_state(&self, block_id: &Id) -> Option<Arc<dyn Chain>> {
        let index = self.index.read().ok()?;
        if let Some(diff) = index
            .blocks
            .get(block_id)
            .and_then(|entry| entry.on_accept_state.clone())
        {
            return Some(diff as Arc<dyn Chain>);
        }
        if self.state.last_accepted().ok()? == *block_id {
            return Some(self.state.clone() as Arc<dyn Chain>);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use cairn_types::block::BlockBody;

    struct Tree {
        fixture: Fixture,
        backend: Arc<Backend>,
    }

    impl Tree {
        fn new() -> Self {
            let fixture = Fixture::new();
            let backend = Arc::new(Backend::new(fixture.state()));
            Self { fixture, backend }
        }

        /// Register a verified legacy standard block under `parent`.
        fn add(&self, parent: Id, height: u64, salt: u8) -> Block {
            let block = Block::new(
                BlockHeader::Legacy { parent, height },
                BlockBody::Standard {
                    txs: vec![self.fixture.advance_time_tx(u64::from(salt))],
                },
            )
            .unwrap();
            let diff = Diff::new(parent, self.backend.clone()).unwrap();
            self.backend
                .insert(BlockState {
                    block: block.clone(),
                    timestamp: 1,
                    on_accept_state: Some(Arc::new(diff)),
                    effects: AtomicEffects::default(),
                })
                .unwrap();
            block
        }
    }

    #[test]
    fn test_get_state_three_ways() {
        let tree = Tree::new();
        let root = tree.fixture.root;
        assert!(tree.backend.get_state(&root).is_some());
        assert!(tree.backend.get_state(&[1u8; 32]).is_none());

        let child = tree.add(root, 1, 1);
        assert!(tree.backend.get_state(&child.id()).is_some());

        // Known but without state.
        let known = Block::new(
            BlockHeader::Legacy {
                parent: child.id(),
                height: 2,
            },
            BlockBody::Commit,
        )
        .unwrap();
        tree.backend
            .insert(BlockState {
                block: known.clone(),
                timestamp: 0,
                on_accept_state: None,
                effects: AtomicEffects::default(),
            })
            .unwrap();
        assert!(tree.backend.get_block(&known.id()).is_ok());
        assert!(tree.backend.get_state(&known.id()).is_none());
        assert!(!tree.backend.is_processing(&known.id()).unwrap());
    }

    #[test]
    fn test_get_block_passes_storage_miss_through() {
        let tree = Tree::new();
        assert!(tree.backend.get_block(&tree.fixture.root).is_ok());
        assert!(matches!(
            tree.backend.get_block(&[3u8; 32]),
            Err(PlatformError::Storage(_))
        ));
    }

    #[test]
    fn test_timestamp_prefers_header_time() {
        let tree = Tree::new();
        let root = tree.fixture.root;
        let timed = Block::new(
            BlockHeader::Timed {
                parent: root,
                height: 1,
                time: 777,
            },
            BlockBody::Standard { txs: vec![] },
        )
        .unwrap();
        tree.backend
            .insert(BlockState {
                block: timed.clone(),
                timestamp: 999,
                on_accept_state: None,
                effects: AtomicEffects::default(),
            })
            .unwrap();
        assert_eq!(tree.backend.get_timestamp(&timed).unwrap(), 777);

        let legacy = tree.add(root, 1, 2);
        assert_eq!(tree.backend.get_timestamp(&legacy).unwrap(), 1);

        let unknown = Block::new(
            BlockHeader::Legacy {
                parent: root,
                height: 1,
            },
            BlockBody::Abort,
        )
        .unwrap();
        assert_eq!(
            tree.backend.get_timestamp(&unknown).unwrap(),
            tree.fixture.genesis_time()
        );
    }

    #[test]
    fn test_accept_evicts_sibling_subtrees() {
        let tree = Tree::new();
        let root = tree.fixture.root;
        let b = tree.add(root, 1, 1);
        let c1 = tree.add(root, 1, 2);
        let c2 = tree.add(root, 1, 3);
        let c1_child = tree.add(c1.id(), 2, 4);
        let c1_grandchild = tree.add(c1_child.id(), 3, 5);
        let b_child = tree.add(b.id(), 2, 6);

        let mut losers = Vec::new();
        let evicted = tree
            .backend
            .accept(&b.id(), |entry, conflicting| {
                assert_eq!(entry.block.id(), b.id());
                losers.extend(conflicting.iter().map(Block::id));
                Ok(())
            })
            .unwrap();

        assert_eq!(evicted, 4);
        losers.sort();
        let mut expected: Vec<Id> = [&c1, &c2, &c1_child, &c1_grandchild]
            .iter()
            .map(|block| block.id())
            .collect();
        expected.sort();
        assert_eq!(losers, expected);
        for gone in [&c1, &c2, &c1_child, &c1_grandchild] {
            assert!(tree.backend.get_block_state(&gone.id()).unwrap().is_none());
            assert!(tree.backend.get_state(&gone.id()).is_none());
        }
        assert!(tree.backend.get_block_state(&b.id()).unwrap().is_none());
        assert!(tree.backend.is_processing(&b_child.id()).unwrap());
        assert_eq!(tree.backend.len().unwrap(), 1);
    }

    #[test]
    fn test_failed_accept_leaves_index_untouched() {
        let tree = Tree::new();
        let root = tree.fixture.root;
        let b = tree.add(root, 1, 1);
        let c = tree.add(root, 1, 2);

        let err = tree
            .backend
            .accept(&b.id(), |_, _| Err(PlatformError::rejected("disk full")))
            .unwrap_err();
        assert!(matches!(err, PlatformError::ExecutionRejected { .. }));
        assert!(tree.backend.is_processing(&b.id()).unwrap());
        assert!(tree.backend.is_processing(&c.id()).unwrap());
        assert_eq!(tree.backend.len().unwrap(), 2);
    }

    #[test]
    fn test_options_outlive_accepted_proposal() {
        let tree = Tree::new();
        let root = tree.fixture.root;
        let proposal = tree.add(root, 1, 1);
        let commit = tree.add(proposal.id(), 2, 2);
        let abort = tree.add(proposal.id(), 2, 3);
        let on_commit = tree.backend.get_block_state(&commit.id()).unwrap().unwrap();
        let on_abort = tree.backend.get_block_state(&abort.id()).unwrap().unwrap();
        tree.backend
            .set_options(
                &proposal.id(),
                ProposalOptions {
                    commit: commit.clone(),
                    abort: abort.clone(),
                    on_commit: on_commit.on_accept_state.unwrap(),
                    on_abort: on_abort.on_accept_state.unwrap(),
                    prefers_commit: true,
                },
            )
            .unwrap();

        tree.backend.accept(&proposal.id(), |_, _| Ok(())).unwrap();
        let options = tree.backend.get_options(&proposal.id()).unwrap().unwrap();
        assert_eq!(options.commit.id(), commit.id());

        let evicted = tree
            .backend
            .accept(&commit.id(), |_, conflicting| {
                assert_eq!(conflicting.len(), 1);
                assert_eq!(conflicting[0].id(), abort.id());
                Ok(())
            })
            .unwrap();
        assert_eq!(evicted, 1);
        assert!(tree.backend.get_options(&proposal.id()).unwrap().is_none());
        assert!(tree.backend.is_empty().unwrap());
    }

    #[test]
    fn test_reject_evicts_descendants_only() {
        let tree = Tree::new();
        let root = tree.fixture.root;
        let a = tree.add(root, 1, 1);
        let a_child = tree.add(a.id(), 2, 2);
        let other = tree.add(root, 1, 3);

        assert_eq!(tree.backend.reject(&a.id()).unwrap(), 2);
        assert!(tree.backend.get_state(&a_child.id()).is_none());
        assert!(tree.backend.is_processing(&other.id()).unwrap());
    }

    #[test]
    fn test_ancestor_input_conflicts() {
        let tree = Tree::new();
        let root = tree.fixture.root;
        let spent = UtxoId::new([8u8; 32], 0);
        let block = Block::new(
            BlockHeader::Legacy {
                parent: root,
                height: 1,
            },
            BlockBody::Standard { txs: vec![] },
        )
        .unwrap();
        let diff = Diff::new(root, tree.backend.clone()).unwrap();
        tree.backend
            .insert(BlockState {
                block: block.clone(),
                timestamp: 0,
                on_accept_state: Some(Arc::new(diff)),
                effects: AtomicEffects {
                    inputs: BTreeSet::from([spent]),
                    ..AtomicEffects::default()
                },
            })
            .unwrap();
        let child = tree.add(block.id(), 2, 1);

        assert!(tree
            .backend
            .conflicts_with_ancestors(&child.id(), &BTreeSet::from([spent]))
            .unwrap());
        assert!(!tree
            .backend
            .conflicts_with_ancestors(&root, &BTreeSet::from([spent]))
            .unwrap());
    }
}
