//! JSON shapes of the Keybase command-line API

use chatca_core::error::ChannelError;
use chatca_core::{InboundMessage, MessageContent, MessageId, Sender, TeamMembership, TeamRole};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Members type used for team conversations
pub const MEMBERS_TYPE_TEAM: &str = "team";

/// Envelope around every API reply
#[derive(Debug, Deserialize)]
pub struct ApiReply<T> {
    pub result: Option<T>,
    pub error: Option<ApiError>,
}

/// Error object returned by the API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl ApiError {
    /// Whether the error reports a missing key-value entry
    pub fn is_not_found(&self) -> bool {
        let message = self.message.to_lowercase();
        message.contains("not found") || message.contains("does not exist")
    }
}

/// Decode an API reply, turning an `error` object into `Err`
pub fn decode_reply<T: DeserializeOwned>(raw: &str) -> Result<T, ApiError> {
    let reply: ApiReply<T> = serde_json::from_str(raw).map_err(|e| ApiError {
        code: 0,
        message: format!("unexpected API reply ({}): {}", e, raw.trim()),
    })?;
    if let Some(error) = reply.error {
        return Err(error);
    }
    reply.result.ok_or_else(|| ApiError {
        code: 0,
        message: format!("API reply without a result: {}", raw.trim()),
    })
}

/// A conversation address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub members_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub topic_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub topic_name: String,
}

impl ChannelSpec {
    /// A team conversation, optionally a specific channel
    pub fn team(team: &str, channel: Option<&str>) -> Self {
        Self {
            name: team.to_string(),
            members_type: MEMBERS_TYPE_TEAM.to_string(),
            topic_type: String::new(),
            topic_name: channel.unwrap_or_default().to_string(),
        }
    }
}

/// `chat api` request sending a text message
pub fn send_request(team: &str, channel: Option<&str>, body: &str) -> Value {
    json!({
        "method": "send",
        "params": {"options": {
            "channel": ChannelSpec::team(team, channel),
            "message": {"body": body},
        }}
    })
}

/// `chat api` request listing a team's channels
pub fn list_channels_request(team: &str) -> Value {
    json!({
        "method": "listconvsonname",
        "params": {"options": {"name": team, "members_type": MEMBERS_TYPE_TEAM, "topic_type": "chat"}}
    })
}

/// `chat api` request joining a channel
pub fn join_request(team: &str, channel: &str) -> Value {
    json!({
        "method": "join",
        "params": {"options": {"channel": ChannelSpec::team(team, Some(channel))}}
    })
}

/// `team api` request listing a user's teams
pub fn list_user_teams_request(username: &str) -> Value {
    json!({
        "method": "list-user-memberships",
        "params": {"options": {"username": username}}
    })
}

/// `kvstore api` request for one entry
pub fn kv_request(method: &str, team: &str, namespace: &str, key: &str, value: Option<&str>) -> Value {
    let mut options = json!({"team": team, "namespace": namespace, "entryKey": key});
    if let Some(value) = value {
        options["entryValue"] = Value::String(value.to_string());
    }
    json!({"method": method, "params": {"options": options}})
}

/// Result of `send`
#[derive(Debug, Deserialize)]
pub struct SendResult {
    pub id: MessageId,
}

/// Result of `listconvsonname`
#[derive(Debug, Deserialize)]
pub struct ConversationList {
    #[serde(default)]
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Deserialize)]
pub struct ConversationSummary {
    pub channel: ChannelSpec,
}

/// Result of `list-user-memberships`
#[derive(Debug, Deserialize)]
pub struct UserTeams {
    #[serde(default)]
    pub teams: Option<Vec<UserTeam>>,
}

#[derive(Debug, Deserialize)]
pub struct UserTeam {
    pub fq_name: String,
    pub role: i64,
}

impl UserTeams {
    /// Every listed team with the user's role in it
    pub fn into_memberships(self) -> Vec<TeamMembership> {
        self.teams
            .unwrap_or_default()
            .into_iter()
            .map(|t| TeamMembership::new(t.fq_name, TeamRole::from_code(t.role)))
            .collect()
    }

    /// Names of the teams whose data the user can read
    pub fn readable(self) -> Vec<String> {
        self.into_memberships()
            .into_iter()
            .filter(|m| m.role.can_read_team())
            .map(|m| m.team)
            .collect()
    }
}

/// Result of a key-value `get`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KvEntry {
    #[serde(default)]
    pub entry_value: Option<String>,
    #[serde(default)]
    pub revision: i64,
}

impl KvEntry {
    /// The value, when the entry exists and has not been deleted
    pub fn value(self) -> Option<String> {
        if self.revision > 0 {
            self.entry_value.filter(|v| !v.is_empty())
        } else {
            None
        }
    }
}

/// `keybase status --json` output
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Status {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub logged_in: bool,
}

#[derive(Debug, Deserialize)]
struct ListenEvent {
    #[serde(rename = "type", default)]
    kind: String,
    msg: Option<ListenMessage>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListenMessage {
    id: MessageId,
    conversation_id: String,
    channel: ChannelSpec,
    sender: ListenSender,
    content: ListenContent,
}

#[derive(Debug, Deserialize)]
struct ListenSender {
    username: String,
    #[serde(default)]
    device_name: String,
}

#[derive(Debug, Deserialize)]
struct ListenContent {
    #[serde(rename = "type")]
    kind: String,
    text: Option<ListenText>,
    reaction: Option<ListenReaction>,
}

#[derive(Debug, Deserialize)]
struct ListenText {
    body: String,
}

#[derive(Debug, Deserialize)]
struct ListenReaction {
    #[serde(rename = "m")]
    target: MessageId,
    #[serde(rename = "b")]
    emoji: String,
}

/// Parse one line of `chat api-listen` output.
///
/// Events that are not chat text or reactions yield `Ok(None)`.
pub fn parse_listen_line(line: &str) -> Result<Option<InboundMessage>, ChannelError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let event: ListenEvent = serde_json::from_str(line)
        .map_err(|e| ChannelError::Read(format!("unparseable event ({}): {}", e, line)))?;
    if let Some(error) = event.error {
        return Err(ChannelError::Read(error));
    }
    if event.kind != "chat" {
        return Ok(None);
    }
    let Some(msg) = event.msg else {
        return Ok(None);
    };

    let content = match msg.content.kind.as_str() {
        "text" => match msg.content.text {
            Some(text) => MessageContent::Text { body: text.body },
            None => return Ok(None),
        },
        "reaction" => match msg.content.reaction {
            Some(reaction) => MessageContent::Reaction {
                emoji: reaction.emoji,
                target: reaction.target,
            },
            None => return Ok(None),
        },
        _ => return Ok(None),
    };

    Ok(Some(InboundMessage {
        id: msg.id,
        conversation_id: msg.conversation_id,
        team: msg.channel.name,
        channel: msg.channel.topic_name,
        sender: Sender {
            username: msg.sender.username,
            device_name: msg.sender.device_name,
        },
        content,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_event() {
        let line = r#"{"type":"chat","source":"remote","msg":{"id":12,"conversation_id":"abc","channel":{"name":"infra.ssh","members_type":"team","topic_type":"chat","topic_name":"general"},"sender":{"uid":"u","username":"alice","device_id":"d","device_name":"laptop"},"sent_at":1,"content":{"type":"text","text":{"body":"ping @cabot"}}}}"#;
        let message = parse_listen_line(line).unwrap().unwrap();
        assert_eq!(message.id, 12);
        assert_eq!(message.team, "infra.ssh");
        assert_eq!(message.channel, "general");
        assert_eq!(message.sender.username, "alice");
        assert_eq!(message.sender.device_name, "laptop");
        assert_eq!(message.text(), Some("ping @cabot"));
    }

    #[test]
    fn test_parse_reaction_event() {
        let line = r#"{"type":"chat","msg":{"id":13,"conversation_id":"abc","channel":{"name":"infra.ssh"},"sender":{"username":"bob"},"content":{"type":"reaction","reaction":{"m":12,"b":":+1:"}}}}"#;
        let message = parse_listen_line(line).unwrap().unwrap();
        assert_eq!(
            message.content,
            MessageContent::Reaction {
                emoji: ":+1:".to_string(),
                target: 12
            }
        );
        assert_eq!(message.channel_opt(), None);
    }

    #[test]
    fn test_other_events_skipped() {
        let edit = r#"{"type":"chat","msg":{"id":14,"conversation_id":"abc","channel":{"name":"t"},"sender":{"username":"a"},"content":{"type":"edit"}}}"#;
        assert!(parse_listen_line(edit).unwrap().is_none());
        assert!(parse_listen_line(r#"{"type":"wallet"}"#).unwrap().is_none());
        assert!(parse_listen_line("").unwrap().is_none());
        assert!(parse_listen_line("garbage").is_err());
    }

    #[test]
    fn test_decode_reply_error() {
        let err = decode_reply::<KvEntry>(r#"{"error":{"code":2760,"message":"entry not found"}}"#)
            .unwrap_err();
        assert!(err.is_not_found());
        let entry: KvEntry =
            decode_reply(r#"{"result":{"teamName":"t","entryValue":"v","revision":3}}"#).unwrap();
        assert_eq!(entry.value().as_deref(), Some("v"));
        let deleted: KvEntry =
            decode_reply(r#"{"result":{"entryValue":"","revision":4}}"#).unwrap();
        assert_eq!(deleted.value(), None);
    }

    #[test]
    fn test_readable_teams() {
        let teams: UserTeams = decode_reply(
            r#"{"result":{"teams":[{"fq_name":"a","role":2},{"fq_name":"b","role":6},{"fq_name":"c","role":0},{"fq_name":"d","role":1}]}}"#,
        )
        .unwrap();
        assert_eq!(teams.readable(), vec!["a", "d"]);
    }

    #[test]
    fn test_memberships_carry_roles() {
        let teams: UserTeams = decode_reply(
            r#"{"result":{"teams":[{"fq_name":"infra.ssh","role":2},{"fq_name":"infra.ssh.root","role":4}]}}"#,
        )
        .unwrap();
        assert_eq!(
            teams.into_memberships(),
            vec![
                TeamMembership::new("infra.ssh", TeamRole::Writer),
                TeamMembership::new("infra.ssh.root", TeamRole::Owner),
            ]
        );
        let empty: UserTeams = decode_reply(r#"{"result":{"teams":null}}"#).unwrap();
        assert!(empty.into_memberships().is_empty());
    }

    #[test]
    fn test_kv_request_shape() {
        let put = kv_request("put", "t", "__sshca", "kssh_config", Some("{}"));
        assert_eq!(put["params"]["options"]["entryKey"], "kssh_config");
        assert_eq!(put["params"]["options"]["entryValue"], "{}");
        let get = kv_request("get", "t", "__sshca", "kssh_config", None);
        assert!(get["params"]["options"].get("entryValue").is_none());
    }
}
