//! Mapping between [`MessageChain`] and the wire's tagged-object arrays.
//!
//! On the wire a chain is a JSON array of objects, each discriminated by a
//! `type` string:
//!
//! ```json
//! [
//!   {"type": "Source", "id": 123, "time": 1700000000},
//!   {"type": "At", "target": 10001, "display": "@bob"},
//!   {"type": "Plain", "text": " hello"}
//! ]
//! ```
//!
//! Decoding goes through one small serde struct per block kind, read
//! straight out of the already-parsed [`Value`] (`&Value` implements
//! `Deserializer`). Encoding builds the objects by hand so optional image
//! and voice fields can be left out instead of written as `null`.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::types::{Image, InertKind, MessageBlock, MessageChain, Source, Voice};
use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Wire shapes (decode side)
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SourceWire {
    id: i64,
    time: i64,
}

#[derive(Deserialize)]
struct AtWire {
    target: i64,
    display: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FaceWire {
    face_id: i64,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct PlainWire {
    text: String,
}

// Image and voice fields are all optional; a present field of the wrong
// kind still fails.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageWire {
    #[serde(default)]
    image_id: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    image_type: Option<String>,
    #[serde(default)]
    is_emoji: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoiceWire {
    #[serde(default)]
    voice_id: Option<String>,
    #[serde(default)]
    url: Option<String>,
    length: i64,
}

fn wire<'a, T: Deserialize<'a>>(element: &'a Value) -> Result<T, ProtocolError> {
    T::deserialize(element).map_err(ProtocolError::Decode)
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Decodes a `messageChain` value, which must be a JSON array.
pub fn decode_chain_value(value: &Value) -> Result<MessageChain, ProtocolError> {
    let elements = value.as_array().ok_or(ProtocolError::InvalidField {
        field: "messageChain",
        expected: "an array",
    })?;
    decode_chain(elements)
}

/// Decodes the elements of a received message chain.
///
/// The chain must carry a `Source` marker; `Quote` elements are skipped.
/// Any block with an unknown tag or a missing/mistyped required field fails
/// the whole chain, and nothing decoded so far is returned.
///
/// # Errors
///
/// - [`ProtocolError::MissingField`] / [`ProtocolError::InvalidField`] if an
///   element is not an object or has no string `type`.
/// - [`ProtocolError::Decode`] if a block's fields do not match its kind.
/// - [`ProtocolError::UnknownBlock`] for an unrecognized `type`.
/// - [`ProtocolError::MissingSource`] if no `Source` element was present.
pub fn decode_chain(elements: &[Value]) -> Result<MessageChain, ProtocolError> {
    let mut source = None;
    let mut blocks = Vec::with_capacity(elements.len());

    for element in elements {
        let object = element.as_object().ok_or(ProtocolError::InvalidField {
            field: "messageChain",
            expected: "an array of objects",
        })?;
        let tag = match object.get("type") {
            Some(Value::String(tag)) => tag.as_str(),
            Some(_) => {
                return Err(ProtocolError::InvalidField {
                    field: "type",
                    expected: "a string",
                })
            }
            None => return Err(ProtocolError::MissingField("type")),
        };

        match tag {
            "Source" => {
                let SourceWire { id, time } = wire(element)?;
                // Keep the first marker if the server ever sends two.
                if source.is_none() {
                    source = Some(Source { id, time });
                }
            }
            "Quote" => continue,
            _ => blocks.push(decode_block(tag, element)?),
        }
    }

    let source = source.ok_or(ProtocolError::MissingSource)?;
    Ok(MessageChain {
        source: Some(source),
        blocks,
    })
}

fn decode_block(tag: &str, element: &Value) -> Result<MessageBlock, ProtocolError> {
    let block = match tag {
        "At" => {
            let AtWire { target, display } = wire(element)?;
            MessageBlock::At { target, display }
        }
        "AtAll" => MessageBlock::AtAll,
        "Face" => {
            let FaceWire { face_id, name } = wire(element)?;
            MessageBlock::Face { face_id, name }
        }
        "Plain" => {
            let PlainWire { text } = wire(element)?;
            MessageBlock::Plain { text }
        }
        "Image" | "FlashImage" => {
            let ImageWire {
                image_id,
                url,
                image_type,
                is_emoji,
            } = wire(element)?;
            MessageBlock::Image(Image {
                image_id,
                url,
                image_type,
                is_flash: tag == "FlashImage",
                is_emoji,
            })
        }
        "Voice" => {
            let VoiceWire {
                voice_id,
                url,
                length,
            } = wire(element)?;
            MessageBlock::Voice(Voice {
                voice_id,
                url,
                length,
            })
        }
        other => match InertKind::from_tag(other) {
            Some(kind) => MessageBlock::Inert(kind),
            None => return Err(ProtocolError::UnknownBlock(other.to_string())),
        },
    };
    Ok(block)
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Encodes a chain into wire objects, one per block, in order.
///
/// The chain's `source` is never written. Inert blocks have no wire form
/// and are skipped.
pub fn encode_chain(chain: &MessageChain) -> Vec<Value> {
    chain.blocks.iter().filter_map(encode_block).collect()
}

fn encode_block(block: &MessageBlock) -> Option<Value> {
    let value = match block {
        MessageBlock::At { target, display } => {
            json!({"type": "At", "target": target, "display": display})
        }
        MessageBlock::AtAll => json!({"type": "AtAll"}),
        MessageBlock::Face { face_id, name } => {
            let mut object = tagged("Face");
            object.insert("faceId".into(), json!(face_id));
            insert_opt(&mut object, "name", name);
            Value::Object(object)
        }
        MessageBlock::Plain { text } => json!({"type": "Plain", "text": text}),
        MessageBlock::Image(image) => {
            let mut object = tagged(block.tag());
            insert_opt(&mut object, "imageId", &image.image_id);
            insert_opt(&mut object, "url", &image.url);
            insert_opt(&mut object, "imageType", &image.image_type);
            object.insert("isEmoji".into(), Value::Bool(image.is_emoji));
            Value::Object(object)
        }
        MessageBlock::Voice(voice) => {
            let mut object = tagged("Voice");
            insert_opt(&mut object, "voiceId", &voice.voice_id);
            insert_opt(&mut object, "url", &voice.url);
            object.insert("length".into(), json!(voice.length));
            Value::Object(object)
        }
        MessageBlock::Inert(kind) => {
            tracing::debug!(kind = kind.tag(), "skipping block with no wire form");
            return None;
        }
    };
    Some(value)
}

fn tagged(tag: &str) -> Map<String, Value> {
    let mut object = Map::new();
    object.insert("type".into(), Value::String(tag.to_string()));
    object
}

fn insert_opt(object: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        object.insert(key.into(), Value::String(value.clone()));
    }
}

// =========================================================================
// Tests
// =========================================================================
