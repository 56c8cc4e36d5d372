use clap::Parser;
use log::LevelFilter;
use std::error::Error;
use std::fs;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use wolk_connect::{
    Attribute, ConnectorConfig, ConnectorEvent, DeviceIdentity, Feed, FeedType, FileManagementHost,
    FirmwareCheckpoint, FirmwareUpdateHost, Transport, WolkConnector,
};

pub type Result<T> = std::result::Result<T, Box<dyn Error>>;

#[derive(Parser, Debug)]
#[command(about = "Demo device connector driving a running WolkConnector loop")]
struct Cli {
    /// MQTT broker host.
    #[arg(long, default_value = "localhost")]
    host: String,

    /// MQTT broker port.
    #[arg(long, default_value_t = 1883)]
    port: u16,

    #[arg(long)]
    device_key: String,

    #[arg(long)]
    device_password: String,

    #[arg(long, default_value_t = 256)]
    chunk_size: usize,

    #[arg(long, default_value_t = 10_000_000)]
    maximum_file_size: u64,

    /// Directory files are written to and read back from.
    #[arg(long, default_value = "./wolk-files")]
    file_dir: String,
}

fn main() {
    // We show info and higher levels by default, but allow overriding this via `RUST_LOG`.
    env_logger::builder().filter_level(LevelFilter::Info).parse_default_env().init();

    if let Err(e) = main_body() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn main_body() -> Result<()> {
    let cli = Cli::parse();
    fs::create_dir_all(&cli.file_dir)?;

    let stream = TcpStream::connect((cli.host.as_str(), cli.port))?;
    stream.set_nonblocking(true)?;
    let transport = TcpTransport { stream };

    let identity = DeviceIdentity::new(cli.device_key, cli.device_password)
        .map_err(|e| format!("invalid device identity: {e}"))?;

    let config = ConnectorConfig {
        identity,
        chunk_size: cli.chunk_size,
        maximum_file_size: cli.maximum_file_size,
        queue_capacity_bytes: 64 * 1024,
        queue_wrap: true,
    };

    let file_host = Box::new(FilesystemFileHost::new(cli.file_dir.clone()));
    let firmware_host = Box::new(DemoFirmwareHost::new(cli.file_dir.clone()));

    let mut connector = WolkConnector::new(config, transport, Some(file_host), firmware_host)?;
    connector.connect()?;

    log::info!("connected, entering process loop");

    loop {
        connector.publish()?;
        let events = connector.process(1000)?;
        for event in events {
            match event {
                ConnectorEvent::ParametersUpdated(params) => {
                    log::info!("platform pushed {} parameter(s)", params.len());
                }
                ConnectorEvent::PlatformTime(utc_ms) => {
                    log::debug!("platform time: {utc_ms}");
                }
                ConnectorEvent::PlatformError(msg) => {
                    log::warn!("platform error: {msg}");
                }
            }
        }
        std::thread::sleep(Duration::from_secs(1));
    }
}

/// Non-blocking TCP transport: `recv` returns `Ok(0)` on `WouldBlock` rather
/// than treating it as an error, matching the `Transport` contract.
struct TcpTransport {
    stream: TcpStream,
}

impl Transport for TcpTransport {
    fn send(&mut self, bytes: &[u8]) -> wolk_connect::Result<usize> {
        self.stream
            .write_all(bytes)
            .map(|_| bytes.len())
            .map_err(|e| wolk_connect::ConnectorError::Send(e.to_string()))
    }

    fn recv(&mut self, buf: &mut [u8]) -> wolk_connect::Result<usize> {
        match self.stream.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(wolk_connect::ConnectorError::Recv(e.to_string())),
        }
    }
}

/// Reference file management backend: each file lives at
/// `{file_dir}/{name}`, chunks are appended as they arrive and re-read in
/// order for the integrity check. Exercises the injected-host boundary that
/// §9's design notes call for; production deployments would swap this for
/// their own filesystem/flash driver.
struct FilesystemFileHost {
    dir: String,
    active_name: Option<String>,
    chunk_boundaries: Vec<(u64, u64)>,
    url_download: Option<(String, bool)>,
}

impl FilesystemFileHost {
    fn new(dir: String) -> Self {
        Self { dir, active_name: None, chunk_boundaries: Vec::new(), url_download: None }
    }

    fn path_for(&self, name: &str) -> String {
        format!("{}/{}", self.dir, name)
    }
}

impl FileManagementHost for FilesystemFileHost {
    fn start(&mut self, file_name: &str, _file_size: u64) -> bool {
        self.active_name = Some(file_name.to_string());
        self.chunk_boundaries.clear();
        fs::File::create(self.path_for(file_name)).is_ok()
    }

    fn write_chunk(&mut self, data: &[u8]) -> bool {
        let Some(name) = self.active_name.clone() else { return false };
        let Ok(mut file) = fs::OpenOptions::new().append(true).open(self.path_for(&name)) else {
            return false;
        };
        let start = self.chunk_boundaries.last().map(|(_, end)| *end).unwrap_or(0);
        let end = start + data.len() as u64;
        if file.write_all(data).is_err() {
            return false;
        }
        self.chunk_boundaries.push((start, end));
        true
    }

    fn read_chunk(&mut self, index: usize) -> Option<Vec<u8>> {
        let name = self.active_name.as_ref()?;
        let (start, end) = *self.chunk_boundaries.get(index)?;
        let mut file = fs::File::open(self.path_for(name)).ok()?;
        let mut buf = vec![0u8; (end - start) as usize];
        use std::io::Seek;
        file.seek(std::io::SeekFrom::Start(start)).ok()?;
        file.read_exact(&mut buf).ok()?;
        Some(buf)
    }

    fn abort(&mut self) {
        if let Some(name) = self.active_name.take() {
            let _ = fs::remove_file(self.path_for(&name));
        }
        self.chunk_boundaries.clear();
    }

    fn finalize(&mut self) {
        self.active_name = None;
        self.chunk_boundaries.clear();
    }

    fn start_url_download(&mut self, url: &str) -> bool {
        // No real HTTP client in the demo harness; record the request and
        // report success with a synthetic filename derived from the URL.
        let name = url.rsplit('/').next().unwrap_or("download.bin").to_string();
        self.url_download = Some((name, true));
        true
    }

    fn is_url_download_done(&mut self) -> Option<(bool, String)> {
        self.url_download.take()
    }

    fn get_file_list(&mut self) -> Vec<wolk_connect::FileListEntry> {
        let Ok(entries) = fs::read_dir(&self.dir) else { return Vec::new() };
        entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let meta = e.metadata().ok()?;
                Some(wolk_connect::FileListEntry {
                    name: e.file_name().to_string_lossy().into_owned(),
                    size: meta.len(),
                    hash: String::new(),
                })
            })
            .collect()
    }

    fn remove_file(&mut self, file_name: &str) -> bool {
        fs::remove_file(self.path_for(file_name)).is_ok()
    }

    fn purge_files(&mut self) -> bool {
        let Ok(entries) = fs::read_dir(&self.dir) else { return false };
        for entry in entries.filter_map(|e| e.ok()) {
            let _ = fs::remove_file(entry.path());
        }
        true
    }
}

/// Reference firmware update backend: "installation" is simulated as an
/// immediate success, and the checkpoint is persisted as a single-byte file.
struct DemoFirmwareHost {
    checkpoint_path: String,
}

impl DemoFirmwareHost {
    fn new(dir: String) -> Self {
        Self { checkpoint_path: format!("{dir}/.firmware_checkpoint") }
    }
}

impl FirmwareUpdateHost for DemoFirmwareHost {
    fn start_installation(&mut self, file_name: &str) -> bool {
        log::info!("simulating installation of {file_name}");
        true
    }

    fn is_installation_completed(&mut self) -> Option<bool> {
        Some(true)
    }

    fn verification_store(&mut self, checkpoint: FirmwareCheckpoint) -> bool {
        let byte = checkpoint as u8;
        fs::write(&self.checkpoint_path, [byte]).is_ok()
    }

    fn verification_read(&mut self) -> FirmwareCheckpoint {
        match fs::read(&self.checkpoint_path) {
            Ok(bytes) if bytes.first() == Some(&2) => FirmwareCheckpoint::Installation,
            _ => FirmwareCheckpoint::Idle,
        }
    }

    fn abort_installation(&mut self) -> bool {
        true
    }
}

#[allow(dead_code)]
fn example_publish(connector: &mut WolkConnector<TcpTransport>) -> Result<()> {
    connector.add_feed(Feed::new("TEMPERATURE", "21.5", FeedType::Numeric))?;
    connector.register_attribute(Attribute::new("FIRMWARE_VERSION", "STRING", "1.0.0"))?;
    Ok(())
}
