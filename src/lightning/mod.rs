use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Opaque 64-bit short channel identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ShortChannelId(pub u64);

impl fmt::Display for ShortChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node public key, 33 bytes compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub [u8; 33]);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(|e| D::Error::custom(format!("decode pubkey: {e}")))?;
        let bytes: [u8; 33] = bytes
            .try_into()
            .map_err(|_| D::Error::custom("pubkey must be 33 bytes"))?;
        Ok(NodeId(bytes))
    }
}

/// A channel snapshot as reported by the node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub channel_id: ShortChannelId,
    pub pubkey: NodeId,
    pub capacity: u64,
    pub local_balance: u64,
    pub remote_balance: u64,
}

#[async_trait]
pub trait LightningClient: Send + Sync {
    async fn list_channels(&self) -> Result<Vec<ChannelInfo>>;
}
