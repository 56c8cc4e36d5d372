//! Protocol codec (§6): topic names and JSON payload shapes for every
//! message this connector sends or receives. Kept separate from the engines
//! so that [`crate::file_management`] and [`crate::firmware_update`] stay
//! free of serialization concerns — they deal in typed outcomes, this module
//! turns those into wire bytes and back.

use crate::file_management::{FileError, FileStatusMessage, FileStatusState, PacketRequest};
use crate::firmware_update::{FirmwareError, FirmwareStatus, FirmwareStatusMessage};
use crate::model::{Attribute, Feed, FeedRegistration, FeedType, FileListEntry, Parameter};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{direction}/{device_key}/{message_type}`, per §6.
pub fn topic(direction: &str, device_key: &str, message_type: &str) -> String {
    format!("{direction}/{device_key}/{message_type}")
}

fn device_to_platform(device_key: &str, message_type: &str) -> String {
    topic("d2p", device_key, message_type)
}

/// One feed reading as it appears inside a `feed_values` batch array entry:
/// `{"timestamp": N, "REFERENCE": value_or_values}`. Numeric values are
/// unquoted; everything else (string, boolean, vector) is quoted, and a
/// vector's values are comma-joined into a single quoted string.
/// `serde_json::Value` always serializes floats through their shortest
/// round-trip representation (`21.5`), so it can't produce the fixed
/// six-decimal text the wire format wants (`21.500000`, matching the
/// original's `sprintf(value_str, "%f", value)`). Built as a raw string
/// instead, the same way the original constructs this payload by hand
/// rather than through a JSON library.
fn feed_to_json(feed: &Feed) -> String {
    let mut fields = Vec::new();
    if feed.utc_ms != 0 {
        fields.push(format!("\"timestamp\":{}", feed.utc_ms));
    }
    let key = serde_json::to_string(&feed.reference).unwrap_or_else(|_| "\"\"".to_string());
    let value = if feed.feed_type == FeedType::Numeric {
        match feed.data.first().and_then(|s| s.parse::<f64>().ok()) {
            Some(v) => format!("{v:.6}"),
            None => "null".to_string(),
        }
    } else {
        serde_json::to_string(&feed.joined_data()).unwrap_or_else(|_| "\"\"".to_string())
    };
    fields.push(format!("{key}:{value}"));
    format!("{{{}}}", fields.join(","))
}

/// Encodes a `feed_values` publication. Per §4.2, every feed in the batch
/// must share either a zero timestamp or a plausible nonzero one — the
/// caller is expected to have already grouped feeds by timestamp.
pub fn encode_feed_values(device_key: &str, feeds: &[Feed]) -> (String, String) {
    let payload = format!("[{}]", feeds.iter().map(feed_to_json).collect::<Vec<_>>().join(","));
    (device_to_platform(device_key, "feed_values"), payload)
}

pub fn encode_attribute_registration(device_key: &str, attribute: &Attribute) -> (String, String) {
    let payload = serde_json::json!({
        "name": attribute.name,
        "dataType": attribute.data_type,
        "value": attribute.value,
    })
    .to_string();
    (device_to_platform(device_key, "attribute_registration"), payload)
}

/// `feed_registration`: an array of feed schema entries, one object per
/// feed being registered. Field naming follows `attribute_registration`'s
/// established `name`/`value`-style convention — the original's concrete
/// JSON grammar for this message wasn't available to copy verbatim (see
/// DESIGN.md).
pub fn encode_feed_registration(device_key: &str, feeds: &[FeedRegistration]) -> (String, String) {
    let array: Vec<Value> = feeds
        .iter()
        .map(|f| {
            serde_json::json!({
                "name": f.name,
                "reference": f.reference,
                "unit": f.unit,
                "feedType": f.feed_type.as_str(),
            })
        })
        .collect();
    (device_to_platform(device_key, "feed_registration"), Value::Array(array).to_string())
}

/// `feed_removal`: removal only needs to identify which feeds to drop, so
/// unlike registration this carries bare reference strings rather than full
/// schema objects.
pub fn encode_feed_removal(device_key: &str, references: &[String]) -> (String, String) {
    let payload = Value::Array(references.iter().cloned().map(Value::String).collect()).to_string();
    (device_to_platform(device_key, "feed_removal"), payload)
}

/// `pull_feed_values`: requests the platform's last known value for every
/// registered feed. No feed-specific payload, mirroring
/// `encode_parameters_pull`'s empty body.
pub fn encode_pull_feed_values(device_key: &str) -> (String, String) {
    (device_to_platform(device_key, "pull_feed_values"), String::new())
}

/// `details_synchronization` request: device asks the platform to resend
/// its registered feeds and attributes. Empty payload, same shape as
/// `pull_feed_values`.
pub fn encode_details_synchronization_request(device_key: &str) -> (String, String) {
    (device_to_platform(device_key, "details_synchronization"), String::new())
}

/// Inbound `details_synchronization` reply: the platform's authoritative
/// feed registrations and attributes.
#[derive(Debug, Deserialize)]
pub struct DetailsSynchronizationPayload {
    #[serde(default)]
    pub feeds: Vec<FeedRegistrationWire>,
    #[serde(default)]
    pub attributes: Vec<AttributeWire>,
}

#[derive(Debug, Deserialize)]
pub struct FeedRegistrationWire {
    pub name: String,
    pub reference: String,
    pub unit: String,
    #[serde(rename = "feedType")]
    pub feed_type: String,
}

#[derive(Debug, Deserialize)]
pub struct AttributeWire {
    pub name: String,
    #[serde(rename = "dataType")]
    pub data_type: String,
    pub value: String,
}

fn feed_type_from_wire(s: &str) -> FeedType {
    match s {
        "STRING" => FeedType::String,
        "BOOLEAN" => FeedType::Boolean,
        "VECTOR" => FeedType::Vector,
        _ => FeedType::Numeric,
    }
}

pub fn decode_details_synchronization(payload: &str) -> Option<(Vec<FeedRegistration>, Vec<Attribute>)> {
    let wire: DetailsSynchronizationPayload = serde_json::from_str(payload).ok()?;
    let feeds = wire
        .feeds
        .into_iter()
        .map(|f| FeedRegistration::new(f.name, f.reference, f.unit, feed_type_from_wire(&f.feed_type)))
        .collect();
    let attributes = wire.attributes.into_iter().map(|a| Attribute::new(a.name, a.data_type, a.value)).collect();
    Some((feeds, attributes))
}

/// A single parameter push/pull/synchronize entry, per SPEC_FULL.md
/// supplemental feature #1: `parameters_update` pushes current values,
/// `parameters_pull` requests the platform's, `parameters_synchronize`
/// requests only the named subset.
#[derive(Debug, Serialize, Deserialize)]
pub struct ParameterWire {
    pub name: String,
    pub value: String,
}

pub fn encode_parameters_update(device_key: &str, parameters: &[Parameter]) -> (String, String) {
    let map: serde_json::Map<String, Value> = parameters
        .iter()
        .map(|p| (p.name.clone(), Value::String(p.value.clone())))
        .collect();
    (device_to_platform(device_key, "parameters"), Value::Object(map).to_string())
}

pub fn encode_parameters_pull(device_key: &str) -> (String, String) {
    (device_to_platform(device_key, "pull_parameters"), String::new())
}

pub fn encode_parameters_synchronize(device_key: &str, names: &[String]) -> (String, String) {
    let payload = Value::Array(names.iter().cloned().map(Value::String).collect()).to_string();
    (device_to_platform(device_key, "synchronize_parameters"), payload)
}

/// Inbound `parameters_update` from the platform: a flat name/value map.
pub fn decode_parameters(payload: &str) -> Option<Vec<Parameter>> {
    let map: serde_json::Map<String, Value> = serde_json::from_str(payload).ok()?;
    Some(
        map.into_iter()
            .map(|(name, value)| Parameter::new(name, value.as_str().unwrap_or_default().to_string()))
            .collect(),
    )
}

/// Inbound `time` message: a single millisecond UTC timestamp.
pub fn decode_time(payload: &str) -> Option<i64> {
    #[derive(Deserialize)]
    struct TimeMessage {
        utc: i64,
    }
    serde_json::from_str::<TimeMessage>(payload).ok().map(|t| t.utc).or_else(|| payload.trim().parse().ok())
}

fn file_error_json(error: Option<FileError>) -> Value {
    match error {
        Some(e) if e != FileError::None => Value::String(e.as_str().to_string()),
        _ => Value::Null,
    }
}

pub fn encode_file_upload_status(device_key: &str, status: &FileStatusMessage) -> (String, String) {
    let payload = serde_json::json!({
        "name": status.name,
        "status": status.status.as_str(),
        "error": file_error_json(status.error),
    })
    .to_string();
    (device_to_platform(device_key, "file_upload_status"), payload)
}

pub fn encode_file_url_download_status(device_key: &str, status: &FileStatusMessage) -> (String, String) {
    let payload = serde_json::json!({
        "name": status.name,
        "status": status.status.as_str(),
        "error": file_error_json(status.error),
    })
    .to_string();
    (device_to_platform(device_key, "file_url_download_status"), payload)
}

pub fn encode_file_binary_request(device_key: &str, request: &PacketRequest) -> (String, String) {
    let payload = serde_json::json!({
        "name": request.name,
        "chunkIndex": request.chunk_index,
    })
    .to_string();
    (device_to_platform(device_key, "file_binary_request"), payload)
}

pub fn encode_file_list(device_key: &str, files: &[FileListEntry]) -> (String, String) {
    let array: Vec<Value> = files
        .iter()
        .map(|f| {
            serde_json::json!({
                "name": f.name,
                "size": f.size,
                "hash": f.hash,
            })
        })
        .collect();
    (device_to_platform(device_key, "file_list"), Value::Array(array).to_string())
}

fn firmware_error_json(error: Option<FirmwareError>) -> Value {
    match error {
        Some(e) if e != FirmwareError::None => Value::String(e.as_str().to_string()),
        _ => Value::Null,
    }
}

pub fn encode_firmware_update_status(device_key: &str, status: &FirmwareStatusMessage) -> (String, String) {
    let payload = serde_json::json!({
        "status": status.status.as_str(),
        "error": firmware_error_json(status.error),
    })
    .to_string();
    (device_to_platform(device_key, "firmware_update_status"), payload)
}

/// The message type a platform-bound topic was classified as by
/// [`classify_topic`]'s substring scan (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundMessageType {
    FeedValues,
    Parameters,
    Time,
    Error,
    DetailsSynchronization,
    FileUploadInitiate,
    FileBinaryResponse,
    FileUploadAbort,
    FileUrlDownloadInitiate,
    FileUrlDownloadAbort,
    FileList,
    FileDelete,
    FilePurge,
    FirmwareUpdateInstall,
    FirmwareUpdateAbort,
    Unknown,
}

/// Fixed priority order the original's `else if (strstr(topic_str, ...))`
/// chain checks message types in (`wolk_connector.c`'s inbound dispatch).
/// `file_list` has no counterpart in that chain and is inserted after the
/// abort topics, matching where it sits in the documented topic list.
const MESSAGE_TYPES: &[(&str, InboundMessageType)] = &[
    ("feed_values", InboundMessageType::FeedValues),
    ("parameters", InboundMessageType::Parameters),
    ("time", InboundMessageType::Time),
    ("error", InboundMessageType::Error),
    ("details_synchronization", InboundMessageType::DetailsSynchronization),
    ("file_upload_initiate", InboundMessageType::FileUploadInitiate),
    ("file_binary_response", InboundMessageType::FileBinaryResponse),
    ("file_upload_abort", InboundMessageType::FileUploadAbort),
    ("file_url_download_abort", InboundMessageType::FileUrlDownloadAbort),
    ("file_url_download_initiate", InboundMessageType::FileUrlDownloadInitiate),
    ("file_list", InboundMessageType::FileList),
    ("file_delete", InboundMessageType::FileDelete),
    ("file_purge", InboundMessageType::FilePurge),
    ("firmware_update_install", InboundMessageType::FirmwareUpdateInstall),
    ("firmware_update_abort", InboundMessageType::FirmwareUpdateAbort),
];

/// First-match substring scan over a fixed message-type set, per §4.6 — the
/// original locates each message type with `strstr(topic_str, ...)` against
/// the full topic string, not a structured parse of its path segments.
pub fn classify_topic(topic: &str) -> InboundMessageType {
    for (needle, message_type) in MESSAGE_TYPES {
        if topic.contains(needle) {
            return *message_type;
        }
    }
    InboundMessageType::Unknown
}

#[derive(Debug, Deserialize)]
pub struct FileUploadInitiatePayload {
    pub name: String,
    pub size: u64,
    pub hash: String,
}

#[derive(Debug, Deserialize)]
pub struct FileUrlDownloadInitiatePayload {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct FileAbortPayload {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct FileDeletePayload {
    pub names: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FirmwareUpdateInstallPayload {
    pub name: String,
}
