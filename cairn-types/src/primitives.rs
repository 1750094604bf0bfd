/// 32-byte BLAKE3 hash.
pub type Hash = [u8; 32];

/// 32-byte identifier for blocks, transactions, chains, subnets and assets.
pub type Id = [u8; 32];

/// 20-byte node identity of a validator.
pub type NodeId = [u8; 20];

/// 32-byte Ed25519 public key.
pub type PublicKey = [u8; 32];

/// 64-byte Ed25519 signature.
pub type Signature = [u8; 64];

/// Token amount in nano-units.
pub type Amount = u64;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Identifier of the primary network subnet (all zeros).
pub const PRIMARY_NETWORK_ID: Id = [0u8; 32];

/// The empty identifier, used where no id has been assigned yet.
pub const EMPTY_ID: Id = [0u8; 32];
