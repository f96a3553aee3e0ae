//! Core protocol types for the mirai-api-http WebSocket adapter.
//!
//! These are the structures the engine hands to applications (received
//! chains, senders, receipts) and accepts from them (chains to send). The
//! wire mapping lives in [`codec`](crate::codec) and [`frame`](crate::frame);
//! the types here carry no serde attributes for message blocks because the
//! block mapping is asymmetric (a received `Image` must carry every field, a
//! sent one may omit some).

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Call identity
// ---------------------------------------------------------------------------

/// Identifier correlating an outbound command with its response.
///
/// Sent as the envelope's `syncId`. Ids are handed out by the call registry
/// starting at 1; zero never names a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub u64);

impl CallId {
    /// Interprets a numeric `syncId` as a call id.
    ///
    /// Returns `None` for zero and negative values, which never name a call.
    pub fn from_sync_id(sync_id: i64) -> Option<Self> {
        u64::try_from(sync_id).ok().filter(|id| *id != 0).map(Self)
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

/// The kind of outbound call, which also fixes its wire command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// `sendFriendMessage`
    FriendMessage,
    /// `sendGroupMessage`
    GroupMessage,
}

impl CallKind {
    /// The `command` string for this call on the wire.
    pub fn command(self) -> &'static str {
        match self {
            Self::FriendMessage => "sendFriendMessage",
            Self::GroupMessage => "sendGroupMessage",
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

// ---------------------------------------------------------------------------
// Message chain
// ---------------------------------------------------------------------------

/// Server-assigned identity of a received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Message id, usable for quoting and recalling.
    pub id: i64,
    /// Unix timestamp in seconds.
    pub time: i64,
}

/// Block kinds the engine recognizes but does not model yet.
///
/// They decode to a bare placeholder and are skipped when encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InertKind {
    Xml,
    Json,
    App,
    Poke,
    Dice,
    MarketFace,
    MusicShare,
    Forward,
    File,
}

impl InertKind {
    /// All inert kinds, in wire-documentation order.
    pub const ALL: [InertKind; 9] = [
        Self::Xml,
        Self::Json,
        Self::App,
        Self::Poke,
        Self::Dice,
        Self::MarketFace,
        Self::MusicShare,
        Self::Forward,
        Self::File,
    ];

    /// Looks up an inert kind by its wire `type` tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// The wire `type` tag.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Xml => "Xml",
            Self::Json => "Json",
            Self::App => "App",
            Self::Poke => "Poke",
            Self::Dice => "Dice",
            Self::MarketFace => "MarketFace",
            Self::MusicShare => "MusicShare",
            Self::Forward => "Forward",
            Self::File => "File",
        }
    }
}

/// An image block. `is_flash` selects the `FlashImage` wire tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Image {
    pub image_id: Option<String>,
    pub url: Option<String>,
    pub image_type: Option<String>,
    pub is_flash: bool,
    pub is_emoji: bool,
}

/// A voice block. `length` is the duration in seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Voice {
    pub voice_id: Option<String>,
    pub url: Option<String>,
    pub length: i64,
}

/// One typed content unit of a [`MessageChain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBlock {
    /// Mention of one member. `display` is the rendered `@name` text.
    At { target: i64, display: String },
    /// Mention of everyone in the group.
    AtAll,
    /// Built-in emoticon. `name` is only present on received blocks.
    Face { face_id: i64, name: Option<String> },
    /// Plain text.
    Plain { text: String },
    Image(Image),
    Voice(Voice),
    /// Recognized kind without modeled structure.
    Inert(InertKind),
}

impl MessageBlock {
    /// The wire `type` tag of this block.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::At { .. } => "At",
            Self::AtAll => "AtAll",
            Self::Face { .. } => "Face",
            Self::Plain { .. } => "Plain",
            Self::Image(image) if image.is_flash => "FlashImage",
            Self::Image(_) => "Image",
            Self::Voice(_) => "Voice",
            Self::Inert(kind) => kind.tag(),
        }
    }
}

/// The ordered content of one chat message.
///
/// Chains received from the server carry a [`Source`]; chains built for
/// sending leave it `None` and it is never written to the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageChain {
    pub source: Option<Source>,
    pub blocks: Vec<MessageBlock>,
}

impl MessageChain {
    /// Creates an empty chain with no source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a block.
    pub fn push(&mut self, block: MessageBlock) -> &mut Self {
        self.blocks.push(block);
        self
    }

    /// Builder-style: appends a `Plain` block.
    pub fn plain(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(MessageBlock::Plain { text: text.into() });
        self
    }

    /// Builder-style: appends an `At` block with `@{target}` as display text.
    pub fn at(mut self, target: i64) -> Self {
        self.blocks.push(MessageBlock::At {
            target,
            display: format!("@{target}"),
        });
        self
    }

    /// Builder-style: appends an `AtAll` block.
    pub fn at_all(mut self) -> Self {
        self.blocks.push(MessageBlock::AtAll);
        self
    }

    /// Builder-style: appends a `Face` block.
    pub fn face(mut self, face_id: i64) -> Self {
        self.blocks.push(MessageBlock::Face {
            face_id,
            name: None,
        });
        self
    }

    /// Builder-style: appends an `Image` block that references a URL.
    pub fn image_url(mut self, url: impl Into<String>) -> Self {
        self.blocks.push(MessageBlock::Image(Image {
            url: Some(url.into()),
            ..Image::default()
        }));
        self
    }

    /// Message id from the source marker, if this chain was received.
    pub fn message_id(&self) -> Option<i64> {
        self.source.map(|s| s.id)
    }

    /// Iterates over the blocks in order.
    pub fn iter(&self) -> std::slice::Iter<'_, MessageBlock> {
        self.blocks.iter()
    }

    /// Number of content blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if the chain has no content blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns `true` if any block mentions `target` (or everyone).
    pub fn mentions(&self, target: i64) -> bool {
        self.blocks.iter().any(|block| match block {
            MessageBlock::At { target: t, .. } => *t == target,
            MessageBlock::AtAll => true,
            _ => false,
        })
    }

    /// Concatenated text of all `Plain` blocks.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                MessageBlock::Plain { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl FromIterator<MessageBlock> for MessageChain {
    fn from_iter<I: IntoIterator<Item = MessageBlock>>(iter: I) -> Self {
        Self {
            source: None,
            blocks: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a MessageChain {
    type Item = &'a MessageBlock;
    type IntoIter = std::slice::Iter<'a, MessageBlock>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

/// Renders the chain as one line for logs: text verbatim, everything else
/// as a bracketed placeholder.
impl fmt::Display for MessageChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            match block {
                MessageBlock::Plain { text } => f.write_str(text)?,
                MessageBlock::At { display, .. } => f.write_str(display)?,
                MessageBlock::AtAll => f.write_str("@all")?,
                MessageBlock::Face { face_id, .. } => write!(f, "[face:{face_id}]")?,
                other => write!(f, "[{}]", other.tag())?,
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Senders
// ---------------------------------------------------------------------------

/// Sender of a friend or stranger message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendSender {
    pub id: i64,
    pub nickname: String,
    pub remark: String,
}

/// The group a member sender belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: i64,
    pub name: String,
    /// The bot's own permission in this group.
    pub permission: String,
}

/// Sender of a group or temp message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSender {
    pub id: i64,
    pub member_name: String,
    pub special_title: String,
    /// `OWNER`, `ADMINISTRATOR`, or `MEMBER`.
    pub permission: String,
    pub join_timestamp: i64,
    pub last_speak_timestamp: i64,
    pub mute_time_remaining: i64,
    pub group: GroupInfo,
}

/// Sender of a message typed on another client of the bot's own account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSender {
    pub id: i64,
    pub platform: String,
}

// ---------------------------------------------------------------------------
// Pushed events and responses
// ---------------------------------------------------------------------------

/// A message received in a private chat with a friend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendMessage {
    pub sender: FriendSender,
    pub chain: MessageChain,
}

/// A message received in a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMessage {
    pub sender: MemberSender,
    pub chain: MessageChain,
}

/// A private message from a group member who is not a friend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempMessage {
    pub sender: MemberSender,
    pub chain: MessageChain,
}

/// A private message from a stranger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrangerMessage {
    pub sender: FriendSender,
    pub chain: MessageChain,
}

/// A message sent from another client logged into the bot's account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherClientMessage {
    pub sender: ClientSender,
    pub chain: MessageChain,
}

/// A server-pushed event this engine models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushedEvent {
    Friend(FriendMessage),
    Group(GroupMessage),
    Temp(TempMessage),
    Stranger(StrangerMessage),
    OtherClient(OtherClientMessage),
}

/// Result of the authentication handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthInfo {
    /// `0` on success; anything else is a server-side status code.
    pub code: i64,
    /// Session key, present on success.
    pub session: Option<String>,
    /// Human-readable status message.
    pub message: Option<String>,
}

impl AuthInfo {
    /// Returns `true` if the server accepted the handshake.
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// The server's answer to a send command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// `0` on success.
    pub code: i64,
    /// Status text.
    #[serde(rename = "msg")]
    pub message: String,
    /// Id of the sent message, `0` when the server did not report one.
    #[serde(rename = "messageId", default)]
    pub message_id: i64,
}

impl SendReceipt {
    /// Returns `true` if the server accepted the message.
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&CallId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_call_id_from_sync_id_rejects_non_positive() {
        assert_eq!(CallId::from_sync_id(7), Some(CallId(7)));
        assert_eq!(CallId::from_sync_id(0), None);
        assert_eq!(CallId::from_sync_id(-1), None);
    }

    #[test]
    fn test_call_id_display() {
        assert_eq!(CallId(3).to_string(), "call-3");
    }

    #[test]
    fn test_call_kind_commands() {
        assert_eq!(CallKind::FriendMessage.command(), "sendFriendMessage");
        assert_eq!(CallKind::GroupMessage.command(), "sendGroupMessage");
    }

    #[test]
    fn test_inert_kind_tags_round_trip() {
        for kind in InertKind::ALL {
            assert_eq!(InertKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(InertKind::from_tag("Plain"), None);
    }

    #[test]
    fn test_block_tag_distinguishes_flash_images() {
        let flash = MessageBlock::Image(Image {
            is_flash: true,
            ..Image::default()
        });
        assert_eq!(flash.tag(), "FlashImage");
        assert_eq!(MessageBlock::Image(Image::default()).tag(), "Image");
    }

    #[test]
    fn test_chain_builder_preserves_order() {
        let chain = MessageChain::new().at(10001).plain(" hello").face(14);
        let tags: Vec<_> = chain.iter().map(MessageBlock::tag).collect();
        assert_eq!(tags, ["At", "Plain", "Face"]);
        assert!(chain.source.is_none());
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn test_chain_display_renders_placeholders() {
        let mut chain = MessageChain::new().at(1).plain(" hi ").face(2);
        chain.push(MessageBlock::Inert(InertKind::Poke));
        assert_eq!(chain.to_string(), "@1 hi [face:2][Poke]");
    }

    #[test]
    fn test_chain_mentions() {
        let chain = MessageChain::new().plain("x").at(5);
        assert!(chain.mentions(5));
        assert!(!chain.mentions(6));
        assert!(MessageChain::new().at_all().mentions(6));
    }

    #[test]
    fn test_chain_plain_text_concatenates() {
        let chain = MessageChain::new().plain("a").at(1).plain("b");
        assert_eq!(chain.plain_text(), "ab");
    }

    #[test]
    fn test_send_receipt_message_id_defaults_to_zero() {
        let receipt: SendReceipt =
            serde_json::from_str(r#"{"code":0,"msg":"success"}"#).unwrap();
        assert_eq!(receipt.message_id, 0);
        assert!(receipt.is_success());
    }

    #[test]
    fn test_send_receipt_rejects_non_integer_message_id() {
        let result: Result<SendReceipt, _> =
            serde_json::from_str(r#"{"code":0,"msg":"ok","messageId":"7"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_member_sender_uses_camel_case() {
        let json = r#"{
            "id": 1, "memberName": "m", "specialTitle": "", "permission": "MEMBER",
            "joinTimestamp": 10, "lastSpeakTimestamp": 20, "muteTimeRemaining": 0,
            "group": {"id": 2, "name": "g", "permission": "ADMINISTRATOR"}
        }"#;
        let sender: MemberSender = serde_json::from_str(json).unwrap();
        assert_eq!(sender.member_name, "m");
        assert_eq!(sender.group.id, 2);
    }
}
