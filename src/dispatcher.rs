//! Inbound message routing (§4.6): classifies an incoming PUBLISH by scanning
//! its topic for a known message-type substring (see
//! [`codec::classify_topic`]) and hands the payload to whichever engine (or
//! plain handler) owns that message type, collecting everything it wants to
//! publish in response.

use crate::codec::{self, InboundMessageType};
use crate::file_management::{FileEngine, FileOutcome};
use crate::firmware_update::{FirmwareEngine, FirmwareOutcome};
use crate::model::{Attribute, FeedRegistration, Parameter};
use crate::queue::OutboundMessage;

/// Messages the dispatcher recognized but that belong to the connector
/// itself rather than to either engine.
#[derive(Debug, Default)]
pub struct DispatchResult {
    pub outbound: Vec<OutboundMessage>,
    pub parameters: Option<Vec<Parameter>>,
    pub platform_utc_ms: Option<i64>,
    pub platform_error: Option<String>,
    pub details_synchronization: Option<(Vec<FeedRegistration>, Vec<Attribute>)>,
}

fn push_file_outcomes(device_key: &str, outcomes: Vec<FileOutcome>, out: &mut Vec<OutboundMessage>) {
    for outcome in outcomes {
        let (topic, payload) = match outcome {
            FileOutcome::Status(s) => codec::encode_file_upload_status(device_key, &s),
            FileOutcome::UrlDownloadStatus(s) => codec::encode_file_url_download_status(device_key, &s),
            FileOutcome::PacketRequest(r) => codec::encode_file_binary_request(device_key, &r),
            FileOutcome::FileList(files) => codec::encode_file_list(device_key, &files),
        };
        if let Ok(msg) = OutboundMessage::new(topic, payload) {
            out.push(msg);
        }
    }
}

fn push_firmware_outcomes(device_key: &str, outcomes: Vec<FirmwareOutcome>, out: &mut Vec<OutboundMessage>) {
    for outcome in outcomes {
        let FirmwareOutcome::Status(s) = outcome;
        let (topic, payload) = codec::encode_firmware_update_status(device_key, &s);
        if let Ok(msg) = OutboundMessage::new(topic, payload) {
            out.push(msg);
        }
    }
}

/// Routes one inbound `(topic, payload)` pair. `payload` is raw bytes: every
/// topic except `file_binary_response` carries JSON and is decoded as UTF-8
/// here, but the binary chunk packet must reach [`FileEngine::handle_chunk`]
/// unconverted (§4.3 hash fields are arbitrary bytes, not valid UTF-8 in
/// general). `file_engine`/`firmware_engine` are threaded in by the caller
/// rather than owned here, matching the engines' own "no back-pointer"
/// design.
pub fn dispatch(
    device_key: &str,
    topic: &str,
    payload: &[u8],
    file_engine: &mut FileEngine,
    firmware_engine: &mut FirmwareEngine,
) -> DispatchResult {
    let mut result = DispatchResult::default();
    let message_type = codec::classify_topic(topic);

    // Only the binary chunk response is not JSON; everything else needs a
    // valid UTF-8 string to even attempt decoding.
    if message_type == InboundMessageType::FileBinaryResponse {
        let outcomes = file_engine.handle_chunk(payload);
        push_file_outcomes(device_key, outcomes, &mut result.outbound);
        return result;
    }

    let Ok(payload) = std::str::from_utf8(payload) else {
        return result;
    };

    match message_type {
        InboundMessageType::FeedValues => {
            // Feed values published by the platform back to the device are
            // out of this connector's scope (device-to-platform only); the
            // topic is still recognized so it isn't misrouted as Unknown.
        }
        InboundMessageType::Parameters => {
            result.parameters = codec::decode_parameters(payload);
        }
        InboundMessageType::Time => {
            result.platform_utc_ms = codec::decode_time(payload);
        }
        InboundMessageType::Error => {
            result.platform_error = Some(payload.to_string());
        }
        InboundMessageType::DetailsSynchronization => {
            result.details_synchronization = codec::decode_details_synchronization(payload);
        }
        InboundMessageType::FileUploadInitiate => {
            if let Ok(p) = serde_json::from_str::<codec::FileUploadInitiatePayload>(payload) {
                let outcomes = file_engine.handle_init_upload(&p.name, p.size, &p.hash);
                push_file_outcomes(device_key, outcomes, &mut result.outbound);
            }
        }
        InboundMessageType::FileBinaryResponse => unreachable!("handled above"),
        InboundMessageType::FileUploadAbort => {
            if let Ok(p) = serde_json::from_str::<codec::FileAbortPayload>(payload) {
                let outcomes = file_engine.handle_abort(&p.name);
                push_file_outcomes(device_key, outcomes, &mut result.outbound);
            }
        }
        InboundMessageType::FileUrlDownloadInitiate => {
            if let Ok(p) = serde_json::from_str::<codec::FileUrlDownloadInitiatePayload>(payload) {
                let outcomes = file_engine.handle_url_download(&p.url);
                push_file_outcomes(device_key, outcomes, &mut result.outbound);
            }
        }
        InboundMessageType::FileUrlDownloadAbort => {
            if let Ok(p) = serde_json::from_str::<codec::FileUrlDownloadInitiatePayload>(payload) {
                let outcomes = file_engine.handle_url_abort(&p.url);
                push_file_outcomes(device_key, outcomes, &mut result.outbound);
            }
        }
        InboundMessageType::FileList => {
            let outcomes = file_engine.handle_file_list();
            push_file_outcomes(device_key, outcomes, &mut result.outbound);
        }
        InboundMessageType::FileDelete => {
            if let Ok(p) = serde_json::from_str::<codec::FileDeletePayload>(payload) {
                let outcomes = file_engine.handle_file_delete(&p.names);
                push_file_outcomes(device_key, outcomes, &mut result.outbound);
            }
        }
        InboundMessageType::FilePurge => {
            let outcomes = file_engine.handle_file_purge();
            push_file_outcomes(device_key, outcomes, &mut result.outbound);
        }
        InboundMessageType::FirmwareUpdateInstall => {
            if let Ok(p) = serde_json::from_str::<codec::FirmwareUpdateInstallPayload>(payload) {
                let outcomes = firmware_engine.handle_install(&p.name);
                push_firmware_outcomes(device_key, outcomes, &mut result.outbound);
            }
        }
        InboundMessageType::FirmwareUpdateAbort => {
            let outcomes = firmware_engine.handle_abort();
            push_firmware_outcomes(device_key, outcomes, &mut result.outbound);
        }
        InboundMessageType::Unknown => {}
    }

    result
}

/// Polls both engines and collects whatever they want published this tick,
/// per §4.7 step 4.
pub fn process_engines(device_key: &str, file_engine: &mut FileEngine, firmware_engine: &mut FirmwareEngine) -> Vec<OutboundMessage> {
    let mut out = Vec::new();
    push_file_outcomes(device_key, file_engine.process(), &mut out);
    push_firmware_outcomes(device_key, firmware_engine.process(), &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_management::FileManagementHost;
    use crate::firmware_update::FirmwareUpdateHost;
    use crate::model::FileListEntry;

    struct NullFileHost;
    impl FileManagementHost for NullFileHost {
        fn start(&mut self, _file_name: &str, _file_size: u64) -> bool {
            true
        }
        fn write_chunk(&mut self, _data: &[u8]) -> bool {
            true
        }
        fn read_chunk(&mut self, _index: usize) -> Option<Vec<u8>> {
            None
        }
        fn abort(&mut self) {}
        fn finalize(&mut self) {}
        fn start_url_download(&mut self, _url: &str) -> bool {
            true
        }
        fn is_url_download_done(&mut self) -> Option<(bool, String)> {
            None
        }
        fn get_file_list(&mut self) -> Vec<FileListEntry> {
            Vec::new()
        }
        fn remove_file(&mut self, _file_name: &str) -> bool {
            true
        }
        fn purge_files(&mut self) -> bool {
            true
        }
    }

    struct NullFirmwareHost;
    impl FirmwareUpdateHost for NullFirmwareHost {
        fn start_installation(&mut self, _file_name: &str) -> bool {
            true
        }
        fn is_installation_completed(&mut self) -> Option<bool> {
            None
        }
        fn verification_store(&mut self, _checkpoint: crate::firmware_update::FirmwareCheckpoint) -> bool {
            true
        }
        fn verification_read(&mut self) -> crate::firmware_update::FirmwareCheckpoint {
            crate::firmware_update::FirmwareCheckpoint::Idle
        }
        fn abort_installation(&mut self) -> bool {
            true
        }
    }

    fn engines() -> (FileEngine, FirmwareEngine) {
        (
            FileEngine::new(Some(Box::new(NullFileHost)), 10_000, 256),
            FirmwareEngine::new(Box::new(NullFirmwareHost)),
        )
    }

    #[test]
    fn routes_parameters_update_to_result() {
        let (mut fe, mut we) = engines();
        let result = dispatch("DEV", "p2d/DEV/parameters", br#"{"keepalive":"60"}"#, &mut fe, &mut we);
        let params = result.parameters.unwrap();
        assert_eq!(params[0].name, "keepalive");
    }

    #[test]
    fn routes_time_to_result() {
        let (mut fe, mut we) = engines();
        let result = dispatch("DEV", "p2d/DEV/time", br#"{"utc":1700000000000}"#, &mut fe, &mut we);
        assert_eq!(result.platform_utc_ms, Some(1_700_000_000_000));
    }

    #[test]
    fn routes_file_upload_initiate_to_file_engine() {
        let (mut fe, mut we) = engines();
        let payload = r#"{"name":"fw.bin","size":10,"hash":"abc"}"#;
        let result = dispatch("DEV", "p2d/DEV/file_upload_initiate", payload.as_bytes(), &mut fe, &mut we);
        assert!(!result.outbound.is_empty());
        assert_eq!(result.outbound[0].topic, "d2p/DEV/file_upload_status");
    }

    #[test]
    fn routes_firmware_update_install_to_firmware_engine() {
        let (mut fe, mut we) = engines();
        let result = dispatch("DEV", "p2d/DEV/firmware_update_install", br#"{"name":"fw.bin"}"#, &mut fe, &mut we);
        assert_eq!(result.outbound[0].topic, "d2p/DEV/firmware_update_status");
    }

    #[test]
    fn routes_details_synchronization_to_result() {
        let (mut fe, mut we) = engines();
        let payload = br#"{"feeds":[{"name":"Temperature","reference":"T","unit":"C","feedType":"NUMERIC"}],"attributes":[{"name":"fw","dataType":"STRING","value":"1.0"}]}"#;
        let result = dispatch("DEV", "p2d/DEV/details_synchronization", payload, &mut fe, &mut we);
        let (feeds, attributes) = result.details_synchronization.unwrap();
        assert_eq!(feeds[0].reference, "T");
        assert_eq!(attributes[0].name, "fw");
    }

    #[test]
    fn unknown_topic_yields_no_outbound_and_no_side_effects() {
        let (mut fe, mut we) = engines();
        let result = dispatch("DEV", "p2d/DEV/something_else", b"{}", &mut fe, &mut we);
        assert!(result.outbound.is_empty());
        assert!(result.parameters.is_none());
    }
}
