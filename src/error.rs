/// Errors that can occur while constructing or driving a [`crate::WolkConnector`].
///
/// Per the design's error handling policy, the engines themselves never
/// return `Err` — a state machine reports failure by transitioning to an
/// error-reporting state and emitting a status message (see
/// [`crate::file_management`] and [`crate::firmware_update`]). `ConnectorError`
/// is reserved for failures at construction time and at the transport
/// boundary, where the caller of `init`/`connect`/`publish` needs something
/// to match on.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("device key exceeds {max} bytes")]
    DeviceKeyTooLong { max: usize },

    #[error("device password exceeds {max} bytes")]
    DevicePasswordTooLong { max: usize },

    #[error("chunk size must be greater than {min} bytes (2 * hash size)")]
    ChunkSizeTooSmall { min: usize },

    #[error("transport is not connected")]
    NotConnected,

    #[error("transport send failed: {0}")]
    Send(String),

    #[error("transport recv failed: {0}")]
    Recv(String),

    #[error("outbound message exceeds size limits (topic or payload too large)")]
    MessageTooLarge,

    #[error("malformed MQTT frame")]
    MalformedFrame,
}

pub type Result<T, E = ConnectorError> = std::result::Result<T, E>;
