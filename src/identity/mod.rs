/// did:hedera identifiers
///
/// `did:hedera:<network>:<multibase-owner-key>_<topicId>`

pub mod topic;

pub use topic::TopicId;

use crate::{
    codec::{multibase_decode, multibase_encode},
    error::{DidError, DidResult},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DID_PREFIX: &str = "did";
pub const DID_METHOD: &str = "hedera";
pub const DID_METHOD_SEPARATOR: char = ':';
pub const DID_TOPIC_SEPARATOR: char = '_';

/// Minimum length of the multibase owner-key segment
pub const MIN_ID_STRING_LENGTH: usize = 44;

/// Hedera networks a DID can live on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Previewnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Previewnet => "previewnet",
        }
    }

    /// Public mirror node REST endpoint for this network
    pub fn default_mirror_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://mainnet-public.mirrornode.hedera.com",
            Network::Testnet => "https://testnet.mirrornode.hedera.com",
            Network::Previewnet => "https://previewnet.mirrornode.hedera.com",
        }
    }
}

impl FromStr for Network {
    type Err = DidError;

    fn from_str(s: &str) -> DidResult<Self> {
        match s {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "previewnet" => Ok(Network::Previewnet),
            other => Err(DidError::InvalidDid(format!(
                "Invalid Hedera network '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed did:hedera identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HcsDid {
    network: Network,
    id_string: String,
    topic_id: TopicId,
}

impl HcsDid {
    /// Parse a DID string
    ///
    /// Every structural deviation is an error; nothing is defaulted.
    pub fn parse(did: &str) -> DidResult<Self> {
        let (did_part, topic_part) = did
            .split_once(DID_TOPIC_SEPARATOR)
            .ok_or(DidError::TopicIdMissing)?;
        if topic_part.is_empty() {
            return Err(DidError::TopicIdMissing);
        }

        let topic_id: TopicId = topic_part.parse()?;

        let mut parts = did_part.split(DID_METHOD_SEPARATOR);

        if parts.next() != Some(DID_PREFIX) {
            return Err(DidError::InvalidDid("DID prefix must be 'did'".to_string()));
        }

        if parts.next() != Some(DID_METHOD) {
            return Err(DidError::InvalidDid(format!(
                "DID method must be '{}'",
                DID_METHOD
            )));
        }

        let network: Network = parts
            .next()
            .ok_or_else(|| DidError::InvalidDid("Hedera network is missing".to_string()))?
            .parse()?;

        let id_string = parts
            .next()
            .ok_or_else(|| DidError::InvalidDid("ID segment is missing".to_string()))?;

        if id_string.len() < MIN_ID_STRING_LENGTH || parts.next().is_some() {
            return Err(DidError::InvalidDid("ID holds incorrect format".to_string()));
        }

        Ok(Self {
            network,
            id_string: id_string.to_string(),
            topic_id,
        })
    }

    /// Build the identifier for an owner public key anchored on `topic_id`
    pub fn from_public_key(network: Network, public_key: &[u8], topic_id: TopicId) -> Self {
        Self {
            network,
            id_string: multibase_encode(public_key),
            topic_id,
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn topic_id(&self) -> &TopicId {
        &self.topic_id
    }

    /// Multibase owner-key segment
    pub fn id_string(&self) -> &str {
        &self.id_string
    }

    /// Owner public key embedded in the identifier
    pub fn public_key(&self) -> DidResult<Vec<u8>> {
        multibase_decode(&self.id_string)
    }

    /// Fragment URL under this DID, e.g. `did:hedera:...#key-1`
    pub fn fragment(&self, fragment: &str) -> String {
        format!("{}#{}", self, fragment)
    }
}

impl FromStr for HcsDid {
    type Err = DidError;

    fn from_str(s: &str) -> DidResult<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for HcsDid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}{}{}",
            DID_PREFIX, DID_METHOD, self.network, self.id_string, DID_TOPIC_SEPARATOR, self.topic_id
        )
    }
}
