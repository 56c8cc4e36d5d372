//! File Management engine (§4.4): chunked, integrity-verified transfer of a
//! file from the platform to the device, plus URL-initiated downloads,
//! listing, deletion and purging.

use crate::limits::{FILE_LIST_SIZE, HASH_SIZE, MAX_RETRIES, PAYLOAD_SIZE, URL_SIZE, VERIFICATION_CHUNK_SIZE};
use crate::model::FileListEntry;
use crate::packet;
use md5::{Digest, Md5};

/// The engine's internal state, per §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Idle,
    PacketTransfer,
    UrlDownload,
    FileObtained,
}

/// Wire-visible `status` value on `file_upload_status` / `file_url_download_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatusState {
    FileTransfer,
    FileReady,
    Error,
    Aborted,
}

impl FileStatusState {
    pub fn as_str(self) -> &'static str {
        match self {
            FileStatusState::FileTransfer => "FILE_TRANSFER",
            FileStatusState::FileReady => "FILE_READY",
            FileStatusState::Error => "ERROR",
            FileStatusState::Aborted => "ABORTED",
        }
    }
}

/// File Management error taxonomy, per §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileError {
    None,
    Unknown,
    TransferProtocolDisabled,
    UnsupportedFileSize,
    MalformedUrl,
    FileHashMismatch,
    FileSystem,
    RetryCountExceeded,
}

impl FileError {
    pub fn as_str(self) -> &'static str {
        match self {
            FileError::None => "NONE",
            FileError::Unknown => "UNKNOWN",
            FileError::TransferProtocolDisabled => "TRANSFER_PROTOCOL_DISABLED",
            FileError::UnsupportedFileSize => "UNSUPPORTED_FILE_SIZE",
            FileError::MalformedUrl => "MALFORMED_URL",
            FileError::FileHashMismatch => "FILE_HASH_MISMATCH",
            FileError::FileSystem => "FILE_SYSTEM",
            FileError::RetryCountExceeded => "RETRY_COUNT_EXCEEDED",
        }
    }
}

/// A status message destined for `file_upload_status` or
/// `file_url_download_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatusMessage {
    pub name: String,
    pub status: FileStatusState,
    pub error: Option<FileError>,
}

/// A `file_binary_request` message: "give me chunk N of file `name`".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRequest {
    pub name: String,
    pub chunk_index: usize,
}

/// Everything a [`FileEngine`] state transition can emit. The dispatcher
/// lifts each of these into an outbound queue push — the engine never holds
/// a reference back to the connector (§9 "Cyclic ownership").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Status(FileStatusMessage),
    PacketRequest(PacketRequest),
    UrlDownloadStatus(FileStatusMessage),
    FileList(Vec<FileListEntry>),
}

/// Host-supplied I/O operations (§4.4). Grouped into a single
/// polymorphic-over-capabilities trait: if the file management feature is
/// unused, the engine is constructed with `host: None` and every request is
/// answered with `TRANSFER_PROTOCOL_DISABLED` rather than null-checking each
/// call individually.
pub trait FileManagementHost {
    fn start(&mut self, file_name: &str, file_size: u64) -> bool;
    fn write_chunk(&mut self, data: &[u8]) -> bool;
    fn read_chunk(&mut self, index: usize) -> Option<Vec<u8>>;
    fn abort(&mut self);
    fn finalize(&mut self);
    fn start_url_download(&mut self, url: &str) -> bool;
    /// `None` while the download is still in progress; `Some((success,
    /// downloaded_name))` once it has finished.
    fn is_url_download_done(&mut self) -> Option<(bool, String)>;
    fn get_file_list(&mut self) -> Vec<FileListEntry>;
    fn remove_file(&mut self, file_name: &str) -> bool;
    fn purge_files(&mut self) -> bool;
}

pub struct FileEngine {
    host: Option<Box<dyn FileManagementHost>>,
    maximum_file_size: u64,
    chunk_size: usize,

    state: FileState,
    file_name: String,
    file_hash: String,
    file_size: u64,
    file_url: String,

    next_chunk_index: usize,
    expected_number_of_chunks: usize,
    previous_packet_hash: [u8; HASH_SIZE],
    retry_count: u32,
}

impl FileEngine {
    /// `chunk_size` is capped at `PAYLOAD_SIZE - 4*HASH_SIZE` per §4.4's
    /// chunk-size policy.
    pub fn new(host: Option<Box<dyn FileManagementHost>>, maximum_file_size: u64, chunk_size: usize) -> Self {
        let capped = chunk_size.min(PAYLOAD_SIZE - 4 * HASH_SIZE);
        Self {
            host,
            maximum_file_size,
            chunk_size: capped,
            state: FileState::Idle,
            file_name: String::new(),
            file_hash: String::new(),
            file_size: 0,
            file_url: String::new(),
            next_chunk_index: 0,
            expected_number_of_chunks: 0,
            previous_packet_hash: [0; HASH_SIZE],
            retry_count: 0,
        }
    }

    pub fn state(&self) -> FileState {
        self.state
    }

    fn effective_payload_per_chunk(&self) -> usize {
        self.chunk_size - 2 * HASH_SIZE
    }

    fn reset_to_idle(&mut self) {
        self.state = FileState::Idle;
        self.previous_packet_hash = [0; HASH_SIZE];
        self.next_chunk_index = 0;
        self.expected_number_of_chunks = 0;
        self.file_name.clear();
        self.file_hash.clear();
        self.file_size = 0;
        self.file_url.clear();
        self.retry_count = 0;
    }

    fn status(&self, status: FileStatusState, error: Option<FileError>) -> FileOutcome {
        FileOutcome::Status(FileStatusMessage {
            name: self.file_name.clone(),
            status,
            error,
        })
    }

    fn url_status(&self, status: FileStatusState, error: Option<FileError>) -> FileOutcome {
        FileOutcome::UrlDownloadStatus(FileStatusMessage {
            name: self.file_name.clone(),
            status,
            error,
        })
    }

    fn packet_request(&self, chunk_index: usize) -> FileOutcome {
        FileOutcome::PacketRequest(PacketRequest {
            name: self.file_name.clone(),
            chunk_index,
        })
    }

    fn file_list_outcome(&mut self) -> FileOutcome {
        let list = match &mut self.host {
            Some(host) => {
                let mut list = host.get_file_list();
                list.truncate(FILE_LIST_SIZE);
                list
            }
            None => Vec::new(),
        };
        FileOutcome::FileList(list)
    }

    /// `init-upload(name, size, hash)`. `hash` is the hex-encoded MD5 digest
    /// of the whole file, compared byte-for-byte once the last chunk lands.
    pub fn handle_init_upload(&mut self, name: &str, size: u64, hash: &str) -> Vec<FileOutcome> {
        if self.host.is_none() {
            return vec![self.status(FileStatusState::Error, Some(FileError::TransferProtocolDisabled))];
        }
        if self.state != FileState::Idle {
            // A transfer is already in flight; the platform's request is ignored.
            return vec![];
        }
        if name.is_empty() {
            return vec![self.status(FileStatusState::Error, Some(FileError::Unknown))];
        }
        if size > self.maximum_file_size {
            return vec![self.status(FileStatusState::Error, Some(FileError::UnsupportedFileSize))];
        }

        let started = self.host.as_mut().unwrap().start(name, size);
        if !started {
            return vec![self.status(FileStatusState::Error, Some(FileError::Unknown))];
        }

        self.file_name = name.to_string();
        self.file_hash = hash.to_string();
        self.file_size = size;
        self.state = FileState::PacketTransfer;
        self.next_chunk_index = 0;
        self.retry_count = 0;
        self.previous_packet_hash = [0; HASH_SIZE];
        self.expected_number_of_chunks =
            ((size as f64) / (self.effective_payload_per_chunk() as f64)).ceil() as usize;

        vec![
            self.status(FileStatusState::FileTransfer, None),
            self.packet_request(0),
        ]
    }

    /// A raw chunk packet `[prev_hash | data | curr_hash]`.
    pub fn handle_chunk(&mut self, raw_packet: &[u8]) -> Vec<FileOutcome> {
        if self.host.is_none() {
            return vec![self.status(FileStatusState::Error, Some(FileError::TransferProtocolDisabled))];
        }
        if self.state != FileState::PacketTransfer {
            return vec![];
        }

        let prev_hash_matches =
            packet::is_valid(raw_packet) && packet::get_previous_hash(raw_packet) == self.previous_packet_hash;

        if !prev_hash_matches {
            self.retry_count += 1;
            if self.retry_count >= MAX_RETRIES {
                self.host.as_mut().unwrap().abort();
                let out = self.status(FileStatusState::Error, Some(FileError::RetryCountExceeded));
                self.reset_to_idle();
                return vec![out];
            }
            return vec![self.packet_request(self.next_chunk_index)];
        }

        let mut curr_hash = [0u8; HASH_SIZE];
        curr_hash.copy_from_slice(packet::get_current_hash(raw_packet));
        self.previous_packet_hash = curr_hash;

        let data = packet::get_data(raw_packet).to_vec();
        if !self.host.as_mut().unwrap().write_chunk(&data) {
            let out = self.status(FileStatusState::Error, Some(FileError::FileSystem));
            self.reset_to_idle();
            return vec![out];
        }

        self.next_chunk_index += 1;
        if self.next_chunk_index < self.expected_number_of_chunks {
            return vec![self.packet_request(self.next_chunk_index)];
        }

        if !self.is_file_valid() {
            self.host.as_mut().unwrap().abort();
            let out = self.status(FileStatusState::Error, Some(FileError::FileHashMismatch));
            self.reset_to_idle();
            return vec![out];
        }

        self.state = FileState::FileObtained;
        let status_event = self.status(FileStatusState::FileReady, None);
        self.host.as_mut().unwrap().finalize();
        let file_list_event = self.file_list_outcome();
        self.reset_to_idle();
        vec![status_event, file_list_event]
    }

    fn is_file_valid(&mut self) -> bool {
        let mut hasher = Md5::new();
        let expected_chunks = self.expected_number_of_chunks;
        let host = self.host.as_mut().unwrap();
        for index in 0..expected_chunks {
            if let Some(mut data) = host.read_chunk(index) {
                // The verification window is bounded; chunks larger than it
                // are fed through in slices, matching the original's
                // fixed-size re-read buffer.
                while !data.is_empty() {
                    let take = data.len().min(VERIFICATION_CHUNK_SIZE);
                    hasher.update(&data[..take]);
                    data.drain(..take);
                }
            }
        }
        let digest = hasher.finalize();
        let computed_hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        computed_hex.eq_ignore_ascii_case(&self.file_hash)
    }

    /// An abort message naming `target_file_name`.
    pub fn handle_abort(&mut self, target_file_name: &str) -> Vec<FileOutcome> {
        if self.state == FileState::Idle {
            return vec![];
        }
        if self.host.is_none() {
            return vec![];
        }

        if self.file_name == target_file_name {
            let was_url_download = self.state == FileState::UrlDownload;
            self.host.as_mut().unwrap().abort();
            let status_event = if was_url_download {
                self.url_status(FileStatusState::Aborted, None)
            } else {
                self.status(FileStatusState::Aborted, None)
            };
            let file_list_event = self.file_list_outcome();
            self.reset_to_idle();
            vec![status_event, file_list_event]
        } else {
            let status_event = self.status(FileStatusState::Error, None);
            let file_list_event = self.file_list_outcome();
            vec![status_event, file_list_event]
        }
    }

    /// An abort message naming the URL originally requested (the download
    /// has no filename yet until it completes).
    pub fn handle_url_abort(&mut self, target_url: &str) -> Vec<FileOutcome> {
        if self.state != FileState::UrlDownload && self.state != FileState::FileObtained {
            return vec![];
        }
        if self.host.is_none() {
            return vec![];
        }
        if self.file_url == target_url {
            self.host.as_mut().unwrap().abort();
            let status_event = self.url_status(FileStatusState::Aborted, None);
            let file_list_event = self.file_list_outcome();
            self.reset_to_idle();
            vec![status_event, file_list_event]
        } else {
            let status_event = self.url_status(FileStatusState::Error, None);
            let file_list_event = self.file_list_outcome();
            vec![status_event, file_list_event]
        }
    }

    pub fn handle_url_download(&mut self, url: &str) -> Vec<FileOutcome> {
        match self.state {
            FileState::Idle | FileState::PacketTransfer => {
                if url.is_empty() || url.len() >= URL_SIZE {
                    return vec![self.url_status(FileStatusState::Error, Some(FileError::MalformedUrl))];
                }
                self.file_url = url.to_string();
                self.file_name.clear();

                if self.host.is_none() {
                    return vec![self.url_status(FileStatusState::Error, Some(FileError::TransferProtocolDisabled))];
                }

                self.state = FileState::UrlDownload;
                vec![self.url_status(FileStatusState::FileTransfer, None)]
            }
            FileState::UrlDownload | FileState::FileObtained => {
                // Already in progress - ignore, reset unconditionally
                // regardless of what's in `url` (no validity/host checks).
                self.reset_to_idle();
                vec![]
            }
        }
    }

    pub fn handle_file_list(&mut self) -> Vec<FileOutcome> {
        vec![self.file_list_outcome()]
    }

    pub fn handle_file_delete(&mut self, names: &[String]) -> Vec<FileOutcome> {
        if let Some(host) = self.host.as_mut() {
            for name in names {
                host.remove_file(name);
            }
        }
        vec![self.file_list_outcome()]
    }

    pub fn handle_file_purge(&mut self) -> Vec<FileOutcome> {
        if let Some(host) = self.host.as_mut() {
            host.purge_files();
        }
        vec![self.file_list_outcome()]
    }

    /// Advances only the URL-download sub-state machine, per §4.4/§4.7.
    pub fn process(&mut self) -> Vec<FileOutcome> {
        if self.host.is_none() {
            return vec![];
        }

        match self.state {
            FileState::Idle | FileState::PacketTransfer => vec![],
            FileState::UrlDownload => {
                let mut events = vec![self.url_status(FileStatusState::FileTransfer, None)];
                let url = self.file_url.clone();
                if self.host.as_mut().unwrap().start_url_download(&url) {
                    self.state = FileState::FileObtained;
                } else {
                    events.push(self.url_status(FileStatusState::Error, Some(FileError::Unknown)));
                    self.reset_to_idle();
                }
                events
            }
            FileState::FileObtained => match self.host.as_mut().unwrap().is_url_download_done() {
                None => vec![],
                Some((true, downloaded_name)) => {
                    self.file_name = downloaded_name;
                    let status_event = self.url_status(FileStatusState::FileReady, None);
                    let file_list_event = self.file_list_outcome();
                    self.reset_to_idle();
                    vec![status_event, file_list_event]
                }
                Some((false, _)) => {
                    let out = self.url_status(FileStatusState::Error, Some(FileError::Unknown));
                    self.reset_to_idle();
                    vec![out]
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct TestHost {
        chunks: HashMap<usize, Vec<u8>>,
        started: Option<(String, u64)>,
        aborted: bool,
        finalized: bool,
        url_download_calls: u32,
        url_download_done: Option<(bool, String)>,
        file_list: Vec<FileListEntry>,
        fail_write: bool,
    }

    impl FileManagementHost for TestHost {
        fn start(&mut self, file_name: &str, file_size: u64) -> bool {
            self.started = Some((file_name.to_string(), file_size));
            true
        }
        fn write_chunk(&mut self, data: &[u8]) -> bool {
            if self.fail_write {
                return false;
            }
            let idx = self.chunks.len();
            self.chunks.insert(idx, data.to_vec());
            true
        }
        fn read_chunk(&mut self, index: usize) -> Option<Vec<u8>> {
            self.chunks.get(&index).cloned()
        }
        fn abort(&mut self) {
            self.aborted = true;
        }
        fn finalize(&mut self) {
            self.finalized = true;
        }
        fn start_url_download(&mut self, _url: &str) -> bool {
            self.url_download_calls += 1;
            true
        }
        fn is_url_download_done(&mut self) -> Option<(bool, String)> {
            self.url_download_done.clone()
        }
        fn get_file_list(&mut self) -> Vec<FileListEntry> {
            self.file_list.clone()
        }
        fn remove_file(&mut self, _file_name: &str) -> bool {
            true
        }
        fn purge_files(&mut self) -> bool {
            true
        }
    }

    fn md5_hex(data: &[u8]) -> String {
        let digest = Md5::digest(data);
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    // S1: two-chunk upload.
    #[test]
    fn two_chunk_upload_completes() {
        let payload: Vec<u8> = (0u8..100).collect();
        let hash = md5_hex(&payload);
        // effective payload per chunk = chunk_size - 2*HASH_SIZE = 116 - 64 = 52
        let mut engine = FileEngine::new(Some(Box::new(TestHost::default())), 1_000, 116);

        let events = engine.handle_init_upload("fw.bin", 100, &hash);
        assert_eq!(
            events,
            vec![
                FileOutcome::Status(FileStatusMessage {
                    name: "fw.bin".into(),
                    status: FileStatusState::FileTransfer,
                    error: None
                }),
                FileOutcome::PacketRequest(PacketRequest { name: "fw.bin".into(), chunk_index: 0 }),
            ]
        );
        assert_eq!(engine.state(), FileState::PacketTransfer);

        let chunk0 = &payload[0..48];
        let packet0 = packet::build(&[0u8; HASH_SIZE], chunk0);
        let events = engine.handle_chunk(&packet0);
        assert_eq!(
            events,
            vec![FileOutcome::PacketRequest(PacketRequest { name: "fw.bin".into(), chunk_index: 1 })]
        );

        let mut prev = [0u8; HASH_SIZE];
        prev.copy_from_slice(packet::get_current_hash(&packet0));
        let chunk1 = &payload[48..100];
        let packet1 = packet::build(&prev, chunk1);
        let events = engine.handle_chunk(&packet1);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], FileOutcome::Status(s) if s.status == FileStatusState::FileReady));
        assert!(matches!(&events[1], FileOutcome::FileList(_)));
        assert_eq!(engine.state(), FileState::Idle);
    }

    // S2 / P4: hash mismatch aborts and returns to IDLE.
    #[test]
    fn hash_mismatch_aborts() {
        let payload: Vec<u8> = (0u8..100).collect();
        let mut bad_hash = md5_hex(&payload);
        bad_hash.replace_range(0..1, if &bad_hash[0..1] == "0" { "1" } else { "0" });

        let mut engine = FileEngine::new(Some(Box::new(TestHost::default())), 1_000, 116);
        engine.handle_init_upload("fw.bin", 100, &bad_hash);

        let chunk0 = &payload[0..48];
        let packet0 = packet::build(&[0u8; HASH_SIZE], chunk0);
        engine.handle_chunk(&packet0);

        let mut prev = [0u8; HASH_SIZE];
        prev.copy_from_slice(packet::get_current_hash(&packet0));
        let chunk1 = &payload[48..100];
        let packet1 = packet::build(&prev, chunk1);
        let events = engine.handle_chunk(&packet1);

        assert_eq!(events.len(), 1);
        match &events[0] {
            FileOutcome::Status(s) => {
                assert_eq!(s.status, FileStatusState::Error);
                assert_eq!(s.error, Some(FileError::FileHashMismatch));
            }
            _ => panic!("expected status"),
        }
        assert_eq!(engine.state(), FileState::Idle);
    }

    // P3: retry bound.
    #[test]
    fn retry_count_exceeded_after_three_invalid_chunks() {
        let mut engine = FileEngine::new(Some(Box::new(TestHost::default())), 1_000, 64);
        engine.handle_init_upload("fw.bin", 100, &md5_hex(b"anything"));

        let garbage = vec![0u8; 10]; // too short to be a valid packet
        let mut last_events = vec![];
        for _ in 0..3 {
            last_events = engine.handle_chunk(&garbage);
        }

        assert_eq!(last_events.len(), 1);
        match &last_events[0] {
            FileOutcome::Status(s) => {
                assert_eq!(s.status, FileStatusState::Error);
                assert_eq!(s.error, Some(FileError::RetryCountExceeded));
            }
            _ => panic!("expected status"),
        }
        assert_eq!(engine.state(), FileState::Idle);
    }

    #[test]
    fn init_upload_rejects_oversized_file() {
        let mut engine = FileEngine::new(Some(Box::new(TestHost::default())), 10, 64);
        let events = engine.handle_init_upload("big.bin", 100, "deadbeef");
        assert_eq!(
            events,
            vec![FileOutcome::Status(FileStatusMessage {
                name: String::new(),
                status: FileStatusState::Error,
                error: Some(FileError::UnsupportedFileSize),
            })]
        );
        assert_eq!(engine.state(), FileState::Idle);
    }

    #[test]
    fn init_upload_rejects_empty_name() {
        let mut engine = FileEngine::new(Some(Box::new(TestHost::default())), 1_000, 64);
        let events = engine.handle_init_upload("", 100, "deadbeef");
        assert!(matches!(&events[0], FileOutcome::Status(s) if s.error == Some(FileError::Unknown)));
    }

    #[test]
    fn disabled_without_host() {
        let mut engine = FileEngine::new(None, 1_000, 64);
        let events = engine.handle_init_upload("fw.bin", 10, "deadbeef");
        assert!(matches!(&events[0], FileOutcome::Status(s) if s.error == Some(FileError::TransferProtocolDisabled)));
    }

    #[test]
    fn abort_matching_file_name_resets_to_idle() {
        let mut engine = FileEngine::new(Some(Box::new(TestHost::default())), 1_000, 64);
        engine.handle_init_upload("fw.bin", 100, &md5_hex(b"x"));
        let events = engine.handle_abort("fw.bin");
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], FileOutcome::Status(s) if s.status == FileStatusState::Aborted));
        assert_eq!(engine.state(), FileState::Idle);
    }

    #[test]
    fn abort_other_file_name_leaves_state_unchanged() {
        let mut engine = FileEngine::new(Some(Box::new(TestHost::default())), 1_000, 64);
        engine.handle_init_upload("fw.bin", 100, &md5_hex(b"x"));
        let events = engine.handle_abort("other.bin");
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], FileOutcome::Status(s) if s.status == FileStatusState::Error));
        assert_eq!(engine.state(), FileState::PacketTransfer);
    }

    // S6: URL download failure.
    #[test]
    fn url_download_failure_reports_error_and_resets() {
        let mut host = TestHost::default();
        host.url_download_done = Some((false, String::new()));
        let mut engine = FileEngine::new(Some(Box::new(host)), 1_000, 64);

        let events = engine.handle_url_download("http://x");
        assert_eq!(
            events,
            vec![FileOutcome::UrlDownloadStatus(FileStatusMessage {
                name: String::new(),
                status: FileStatusState::FileTransfer,
                error: None
            })]
        );
        assert_eq!(engine.state(), FileState::UrlDownload);

        let events = engine.process();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], FileOutcome::UrlDownloadStatus(s) if s.status == FileStatusState::FileTransfer));
        assert_eq!(engine.state(), FileState::FileObtained);

        let events = engine.process();
        assert_eq!(events.len(), 1);
        match &events[0] {
            FileOutcome::UrlDownloadStatus(s) => assert_eq!(s.status, FileStatusState::Error),
            _ => panic!("expected url download status"),
        }
        assert_eq!(engine.state(), FileState::Idle);
    }

    #[test]
    fn url_abort_matching_url_resets_to_idle() {
        let mut engine = FileEngine::new(Some(Box::new(TestHost::default())), 1_000, 64);
        engine.handle_url_download("http://x/fw.bin");
        let events = engine.handle_url_abort("http://x/fw.bin");
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], FileOutcome::UrlDownloadStatus(s) if s.status == FileStatusState::Aborted));
        assert_eq!(engine.state(), FileState::Idle);
    }

    #[test]
    fn malformed_url_is_rejected() {
        let mut engine = FileEngine::new(Some(Box::new(TestHost::default())), 1_000, 64);
        let events = engine.handle_url_download("");
        assert!(matches!(&events[0], FileOutcome::UrlDownloadStatus(s) if s.error == Some(FileError::MalformedUrl)));
        assert_eq!(engine.state(), FileState::Idle);
    }

    #[test]
    fn malformed_url_mid_download_resets_instead_of_erroring() {
        let mut engine = FileEngine::new(Some(Box::new(TestHost::default())), 1_000, 64);
        engine.handle_url_download("http://example.com/fw.bin");
        assert_eq!(engine.state(), FileState::UrlDownload);

        let events = engine.handle_url_download("");
        assert!(events.is_empty());
        assert_eq!(engine.state(), FileState::Idle);
    }

    #[test]
    fn write_chunk_failure_reports_file_system_error() {
        let mut host = TestHost::default();
        host.fail_write = true;
        let mut engine = FileEngine::new(Some(Box::new(host)), 1_000, 64);
        engine.handle_init_upload("fw.bin", 100, &md5_hex(b"x"));
        let packet0 = packet::build(&[0u8; HASH_SIZE], &[0u8; 48]);
        let events = engine.handle_chunk(&packet0);
        assert!(matches!(&events[0], FileOutcome::Status(s) if s.error == Some(FileError::FileSystem)));
        assert_eq!(engine.state(), FileState::Idle);
    }
}
