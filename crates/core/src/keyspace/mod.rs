mod codec;
mod error;
pub mod keys;

pub use codec::{decode, encode, DecodedKey, EncodedKeys, Entity, EntityKind, IdentityKey, IndexKeys};
pub use error::KeyspaceError;
