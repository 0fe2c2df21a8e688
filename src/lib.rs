/// HCS DID Resolver - event-sourced did:hedera resolution
///
/// Rebuilds the current DID document of a `did:hedera` identifier from the
/// signed messages on its Hedera Consensus Service topic, as served by a
/// mirror node.

pub mod codec;
pub mod config;
pub mod crypto;
pub mod document;
pub mod error;
pub mod event;
pub mod identity;
pub mod message;
pub mod resolver;
pub mod transport;

pub use config::ResolverConfig;
pub use crypto::{DefaultVerifier, KeySigner, SignatureVerifier};
pub use document::{resolve, DocumentAssembler, DocumentState, ResolvedDocument};
pub use error::{DidError, DidResult};
pub use identity::{HcsDid, Network, TopicId};
pub use message::{Message, MessageEnvelope, Operation};
pub use resolver::{CancelHandle, EventMessageResolver};
pub use transport::{HttpMirrorClient, MirrorClient, TopicListener};
