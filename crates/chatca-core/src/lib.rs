//! chatca core - shared foundation of the chat-driven SSH certificate authority
//!
//! This crate provides the error types, configuration, wire protocol and
//! messaging abstractions used by both the authority and the client.

pub mod channel;
pub mod client_config;
pub mod config;
pub mod error;
pub mod expiration;
pub mod message;
pub mod pool;
pub mod protocol;
pub mod roles;

pub use channel::memory::{MemoryChannel, MemoryHub};
pub use channel::{KvStore, MessagingChannel, Subscription};
pub use client_config::{ClientConfig, CLIENT_CONFIG_KEY, CLIENT_CONFIG_NAMESPACE};
pub use config::CaConfig;
pub use error::{ChannelError, ChatCaError, ConfigError, ProtocolError, Result};
pub use expiration::{Expiration, ExpirationUnit};
pub use message::{InboundMessage, MessageContent, MessageId, MessageRef, Sender};
pub use pool::{run_bounded, MAX_CONCURRENT_OPS};
pub use protocol::{classify, Classified, SignatureRequest, SignatureResponse};
pub use roles::{TeamMember, TeamMembership, TeamRole};
