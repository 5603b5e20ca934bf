//! Wire protocol spoken between the client and the authority over chat.
//!
//! The client first sends `AckRequest--<username>` messages until the
//! authority answers with `Ack--<username>`, proving both sides are reading
//! the conversation. It then sends a signature request: a JSON object behind
//! the `Signature_Request:` preamble, holding the SSH public key and a
//! client-generated uuid. The authority answers with `Signature_Response:`
//! followed by JSON carrying the same uuid and the signed certificate.
//!
//! Every inbound message is sorted into a [`Classified`] variant by
//! [`classify`], a pure function the authority matches on exhaustively.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::message::{InboundMessage, MessageContent, MessageId};

/// Preamble at the start of signature request messages
pub const SIGNATURE_REQUEST_PREAMBLE: &str = "Signature_Request:";

/// Preamble at the start of signature response messages
pub const SIGNATURE_RESPONSE_PREAMBLE: &str = "Signature_Response:";

/// Prefix of ack request messages
pub const ACK_REQUEST_PREFIX: &str = "AckRequest--";

/// Prefix of ack response messages
pub const ACK_RESPONSE_PREFIX: &str = "Ack--";

/// Reaction bodies counted as an approval
pub const APPROVAL_EMOJIS: &[&str] = &[":+1:", ":thumbsup:", "\u{1F44D}"];

/// Body of a signature request sent over chat
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRequest {
    /// The requester's SSH public key
    pub ssh_public_key: String,

    /// Client-generated correlation id
    pub uuid: String,

    /// Principal explicitly requested (empty means any non-gated principal)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub requested_principal: String,

    /// Verified sender username, filled in by the authority on receipt
    #[serde(skip)]
    pub username: String,

    /// Verified sender device, filled in by the authority on receipt
    #[serde(skip)]
    pub device_name: String,
}

impl SignatureRequest {
    /// Create a request for the given public key and correlation id
    pub fn new(ssh_public_key: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            ssh_public_key: ssh_public_key.into(),
            uuid: uuid.into(),
            ..Default::default()
        }
    }

    /// Set the requested principal
    pub fn with_requested_principal(mut self, principal: impl Into<String>) -> Self {
        self.requested_principal = principal.into();
        self
    }

    /// Parse a chat message body into a signature request.
    ///
    /// `username` and `device_name` are never taken from the payload.
    pub fn parse(body: &str) -> Result<Self, ProtocolError> {
        let payload = body
            .strip_prefix(SIGNATURE_REQUEST_PREAMBLE)
            .ok_or(ProtocolError::MissingPreamble(SIGNATURE_REQUEST_PREAMBLE))?;
        serde_json::from_str(payload).map_err(|source| ProtocolError::MalformedPayload {
            kind: "signature request",
            source,
        })
    }

    /// Serialize into a chat message body
    pub fn to_message(&self) -> Result<String, serde_json::Error> {
        Ok(format!(
            "{}{}",
            SIGNATURE_REQUEST_PREAMBLE,
            serde_json::to_string(self)?
        ))
    }
}

/// Body of a signature response sent over chat
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureResponse {
    /// The signed certificate
    pub signed_key: String,

    /// Correlation id copied from the request
    pub uuid: String,
}

impl SignatureResponse {
    /// Parse a chat message body into a signature response
    pub fn parse(body: &str) -> Result<Self, ProtocolError> {
        let payload = body
            .strip_prefix(SIGNATURE_RESPONSE_PREAMBLE)
            .ok_or(ProtocolError::MissingPreamble(SIGNATURE_RESPONSE_PREAMBLE))?;
        serde_json::from_str(payload).map_err(|source| ProtocolError::MalformedPayload {
            kind: "signature response",
            source,
        })
    }

    /// Serialize into a chat message body
    pub fn to_message(&self) -> Result<String, serde_json::Error> {
        Ok(format!(
            "{}{}",
            SIGNATURE_RESPONSE_PREAMBLE,
            serde_json::to_string(self)?
        ))
    }
}

/// Build an ack request for the given username
pub fn ack_request(username: &str) -> String {
    format!("{}{}", ACK_REQUEST_PREFIX, username)
}

/// Build the ack response for an ack request body
pub fn ack_response(ack_request: &str) -> String {
    ack_request.replacen("AckRequest", "Ack", 1)
}

/// Build the ping body addressed to the given bot
pub fn ping_request(bot_username: &str) -> String {
    format!("ping @{}", bot_username)
}

/// Build the pong reply addressed to the pinging user
pub fn ping_response(sender: &str) -> String {
    format!("pong @{}", sender)
}

/// Whether a body looks like a message only a client would send
pub fn is_client_message(body: &str) -> bool {
    body.contains(ACK_REQUEST_PREFIX) || body.contains(SIGNATURE_REQUEST_PREAMBLE)
}

/// Whether a reaction emoji counts as an approval
pub fn is_approval_emoji(emoji: &str) -> bool {
    APPROVAL_EMOJIS.contains(&emoji.trim())
}

/// Classification of an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classified<'a> {
    /// `ping @<authority>`
    Ping,
    /// `AckRequest--<username>`, carrying the full body
    AckRequest { body: &'a str, username: &'a str },
    /// `Ack--<username>`
    AckResponse { username: &'a str },
    /// `Signature_Request:{...}`, carrying the full body
    SignatureRequest(&'a str),
    /// `Signature_Response:{...}`, carrying the full body
    SignatureResponse(&'a str),
    /// Reaction on another message
    Reaction { emoji: &'a str, target: MessageId },
    /// Anything else
    Unknown,
}

/// Classify an inbound message.
///
/// `authority_username` is the identity the authority runs as; it is only
/// needed to recognize pings addressed to it.
pub fn classify<'a>(message: &'a InboundMessage, authority_username: &str) -> Classified<'a> {
    let body = match &message.content {
        MessageContent::Reaction { emoji, target } => {
            return Classified::Reaction {
                emoji,
                target: *target,
            }
        }
        MessageContent::Text { body } => body.as_str(),
    };

    if body.trim() == ping_request(authority_username) {
        Classified::Ping
    } else if let Some(username) = body.strip_prefix(ACK_REQUEST_PREFIX) {
        Classified::AckRequest { body, username }
    } else if let Some(username) = body.strip_prefix(ACK_RESPONSE_PREFIX) {
        Classified::AckResponse { username }
    } else if body.starts_with(SIGNATURE_REQUEST_PREAMBLE) {
        Classified::SignatureRequest(body)
    } else if body.starts_with(SIGNATURE_RESPONSE_PREAMBLE) {
        Classified::SignatureResponse(body)
    } else {
        Classified::Unknown
    }
}
