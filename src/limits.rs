//! Size limits from §6 of the design, mirroring `sources/size_definitions.h`
//! in the original WolkConnect-C implementation.

/// Maximum number of characters in device key string.
pub const DEVICE_KEY_SIZE: usize = 64;
/// Maximum number of characters in device password string.
pub const DEVICE_PASSWORD_SIZE: usize = 64;

/// Topic root path size (`"d2p/"` / `"p2d/"`).
pub const TOPIC_DIRECTION_SIZE: usize = 4;
/// Topic branch size.
pub const TOPIC_MESSAGE_TYPE_SIZE: usize = 64;
/// Maximum number of characters in topic string.
pub const TOPIC_SIZE: usize = TOPIC_DIRECTION_SIZE + DEVICE_KEY_SIZE + TOPIC_MESSAGE_TYPE_SIZE;

/// Maximum number of bytes in payload string.
pub const PAYLOAD_SIZE: usize = 2048;

/// Maximum number of characters in a single feed element.
pub const FEED_ELEMENT_SIZE: usize = 64;
/// Maximum number of feeds in a single batch.
pub const FEEDS_MAX_NUMBER: usize = 32;

/// Maximum number of characters in reference/name strings.
pub const REFERENCE_SIZE: usize = 64;
pub const ITEM_NAME_SIZE: usize = 64;
/// Maximum number of characters in a feed's unit string.
pub const ITEM_UNIT_SIZE: usize = 25;

/// Maximum number of characters in parameter value.
pub const PARAMETER_VALUE_SIZE: usize = FEED_ELEMENT_SIZE;
/// Maximum number of characters in attribute value.
pub const ATTRIBUTE_VALUE_SIZE: usize = FEED_ELEMENT_SIZE;

/// Maximum number of files in a file list.
pub const FILE_LIST_SIZE: usize = 32;
/// Maximum number of characters in a file management filename.
pub const FILE_NAME_SIZE: usize = 64;
/// Maximum number of characters in a file management file URL.
pub const URL_SIZE: usize = 64;
/// Size (in bytes) of the hash used for file chunk framing and whole-file
/// integrity (SHA-256 for chunks; MD5-derived hex digest for the whole file).
pub const HASH_SIZE: usize = 32;
/// Size of the chunks read back from the host during the verification phase.
pub const VERIFICATION_CHUNK_SIZE: usize = 1024;

/// Maximum retries for a single chunk before the transfer is aborted.
pub const MAX_RETRIES: u32 = 3;

/// Number of messages drained from the outbound queue per `publish()` call.
pub const PUBLISH_BATCH_SIZE: usize = 50;

/// MQTT keepalive interval, in milliseconds.
pub const KEEPALIVE_INTERVAL_MS: u64 = 60_000;
