//! Firmware Update engine (§4.5): an installation state machine that
//! consumes a previously transferred file, records a persistent checkpoint
//! across a device reboot, and reports success or failure.

/// The engine's internal state, per §3. Only `Installation` survives a
/// process restart — it is the state recoverable from the host-persisted
/// checkpoint on startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareState {
    Idle,
    Installation,
    Completed,
    Error,
}

/// Wire-visible `status` value on `firmware_update_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareStatus {
    AwaitingDevice,
    Installing,
    Success,
    Error,
    Aborted,
    Unknown,
}

impl FirmwareStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FirmwareStatus::AwaitingDevice => "AWAITING_DEVICE",
            FirmwareStatus::Installing => "INSTALLING",
            FirmwareStatus::Success => "SUCCESS",
            FirmwareStatus::Error => "ERROR",
            FirmwareStatus::Aborted => "ABORTED",
            FirmwareStatus::Unknown => "UNKNOWN",
        }
    }
}

/// Firmware Update error taxonomy, per §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareError {
    None,
    Unknown,
    UnknownFile,
    InstallationFailed,
}

impl FirmwareError {
    pub fn as_str(self) -> &'static str {
        match self {
            FirmwareError::None => "NONE",
            FirmwareError::Unknown => "UNKNOWN",
            FirmwareError::UnknownFile => "UNKNOWN_FILE",
            FirmwareError::InstallationFailed => "INSTALLATION_FAILED",
        }
    }
}

/// A single persisted integer, per §6: `Idle = 1`, `Installation = 2`. Only
/// these two values are ever stored — `Completed`/`Error` reset to `Idle`
/// and re-store `Idle` before the engine returns control (SPEC_FULL.md
/// supplemental feature #4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareCheckpoint {
    Idle = 1,
    Installation = 2,
}

/// A `firmware_update_status` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareStatusMessage {
    pub status: FirmwareStatus,
    pub error: Option<FirmwareError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirmwareOutcome {
    Status(FirmwareStatusMessage),
}

/// Host-supplied I/O operations (§4.5). Unlike File Management, every
/// operation here is mandatory — a firmware-capable device always has a
/// place to install to and a way to persist the checkpoint.
pub trait FirmwareUpdateHost {
    fn start_installation(&mut self, file_name: &str) -> bool;
    /// `None` while still installing; `Some(success)` once finished.
    fn is_installation_completed(&mut self) -> Option<bool>;
    fn verification_store(&mut self, checkpoint: FirmwareCheckpoint) -> bool;
    fn verification_read(&mut self) -> FirmwareCheckpoint;
    fn abort_installation(&mut self) -> bool;
}

pub struct FirmwareEngine {
    host: Box<dyn FirmwareUpdateHost>,
    state: FirmwareState,
    error: FirmwareError,
    file_name: String,
}

impl FirmwareEngine {
    /// Reads the persisted checkpoint; if it says `Installation`, the
    /// engine resumes there without any inbound install command (P7).
    pub fn new(mut host: Box<dyn FirmwareUpdateHost>) -> Self {
        let state = match host.verification_read() {
            FirmwareCheckpoint::Installation => FirmwareState::Installation,
            FirmwareCheckpoint::Idle => FirmwareState::Idle,
        };
        Self {
            host,
            state,
            error: FirmwareError::None,
            file_name: String::new(),
        }
    }

    pub fn state(&self) -> FirmwareState {
        self.state
    }

    fn reset_to_idle(&mut self) {
        self.state = FirmwareState::Idle;
        self.file_name.clear();
    }

    fn status(&self, status: FirmwareStatus, error: Option<FirmwareError>) -> FirmwareOutcome {
        FirmwareOutcome::Status(FirmwareStatusMessage { status, error })
    }

    /// `install(name)` from the `firmware_update_install` topic.
    pub fn handle_install(&mut self, file_name: &str) -> Vec<FirmwareOutcome> {
        match self.state {
            FirmwareState::Idle => {
                self.file_name = file_name.to_string();
                self.state = FirmwareState::Installation;

                let mut events = vec![self.status(FirmwareStatus::Installing, None)];

                if !self.host.verification_store(FirmwareCheckpoint::Installation) {
                    self.state = FirmwareState::Error;
                    self.error = FirmwareError::UnknownFile;
                    return events;
                }

                if !self.host.start_installation(file_name) {
                    self.state = FirmwareState::Error;
                    self.error = FirmwareError::Unknown;
                }

                events
            }
            FirmwareState::Installation => vec![self.status(FirmwareStatus::Installing, None)],
            FirmwareState::Completed => vec![],
            FirmwareState::Error => {
                let out = self.status(FirmwareStatus::Error, Some(self.error));
                self.reset_to_idle();
                vec![out]
            }
        }
    }

    /// `abort` from the `firmware_update_abort` topic.
    pub fn handle_abort(&mut self) -> Vec<FirmwareOutcome> {
        match self.state {
            FirmwareState::Idle | FirmwareState::Completed | FirmwareState::Error => {
                if self.host.abort_installation() {
                    vec![self.status(FirmwareStatus::Aborted, None)]
                } else {
                    vec![self.status(FirmwareStatus::Error, Some(FirmwareError::Unknown))]
                }
            }
            FirmwareState::Installation => {
                if self.host.abort_installation() {
                    vec![self.status(FirmwareStatus::Aborted, None)]
                } else {
                    self.error = FirmwareError::Unknown;
                    vec![self.status(FirmwareStatus::Error, Some(FirmwareError::Unknown))]
                }
            }
        }
    }

    /// Polls installation completion and advances state, per §4.7 step 4.
    pub fn process(&mut self) -> Vec<FirmwareOutcome> {
        match self.state {
            FirmwareState::Idle => vec![],
            FirmwareState::Installation => match self.host.is_installation_completed() {
                None => vec![],
                Some(true) => {
                    self.state = FirmwareState::Completed;
                    vec![]
                }
                Some(false) => {
                    self.state = FirmwareState::Error;
                    self.error = FirmwareError::InstallationFailed;
                    vec![]
                }
            },
            FirmwareState::Completed => {
                let out = self.status(FirmwareStatus::Success, None);
                self.reset_to_idle();
                self.host.verification_store(FirmwareCheckpoint::Idle);
                vec![out]
            }
            FirmwareState::Error => {
                let out = self.status(FirmwareStatus::Error, Some(self.error));
                self.reset_to_idle();
                self.host.verification_store(FirmwareCheckpoint::Idle);
                vec![out]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct HostState {
        checkpoint: FirmwareCheckpoint_,
        install_calls: Vec<String>,
        completed: Option<bool>,
        abort_result: bool,
        start_installation_result: bool,
    }

    // Wrapper so `FirmwareCheckpoint` (no Default) can live in `HostState`.
    #[derive(Clone, Copy)]
    struct FirmwareCheckpoint_(FirmwareCheckpoint);
    impl Default for FirmwareCheckpoint_ {
        fn default() -> Self {
            FirmwareCheckpoint_(FirmwareCheckpoint::Idle)
        }
    }

    struct TestHost(Rc<RefCell<HostState>>);

    impl FirmwareUpdateHost for TestHost {
        fn start_installation(&mut self, file_name: &str) -> bool {
            let mut s = self.0.borrow_mut();
            s.install_calls.push(file_name.to_string());
            s.start_installation_result
        }
        fn is_installation_completed(&mut self) -> Option<bool> {
            self.0.borrow().completed
        }
        fn verification_store(&mut self, checkpoint: FirmwareCheckpoint) -> bool {
            self.0.borrow_mut().checkpoint = FirmwareCheckpoint_(checkpoint);
            true
        }
        fn verification_read(&mut self) -> FirmwareCheckpoint {
            self.0.borrow().checkpoint.0
        }
        fn abort_installation(&mut self) -> bool {
            self.0.borrow().abort_result
        }
    }

    fn fresh_host() -> (Rc<RefCell<HostState>>, TestHost) {
        let state = Rc::new(RefCell::new(HostState {
            start_installation_result: true,
            ..Default::default()
        }));
        let host = TestHost(state.clone());
        (state, host)
    }

    #[test]
    fn install_transitions_to_installation_and_stores_checkpoint() {
        let (state, host) = fresh_host();
        let mut engine = FirmwareEngine::new(Box::new(host));
        let events = engine.handle_install("fw.bin");
        assert_eq!(
            events,
            vec![FirmwareOutcome::Status(FirmwareStatusMessage {
                status: FirmwareStatus::Installing,
                error: None
            })]
        );
        assert_eq!(engine.state(), FirmwareState::Installation);
        assert!(matches!(state.borrow().checkpoint.0, FirmwareCheckpoint::Installation));
        assert_eq!(state.borrow().install_calls, vec!["fw.bin".to_string()]);
    }

    // S5: firmware install then reboot.
    #[test]
    fn resumes_from_persisted_installation_checkpoint() {
        let (state, _host) = fresh_host();
        state.borrow_mut().checkpoint = FirmwareCheckpoint_(FirmwareCheckpoint::Installation);
        state.borrow_mut().completed = Some(true);

        let host = TestHost(state.clone());
        let mut engine = FirmwareEngine::new(Box::new(host));
        assert_eq!(engine.state(), FirmwareState::Installation);

        let events = engine.process();
        assert!(events.is_empty());
        assert_eq!(engine.state(), FirmwareState::Completed);

        let events = engine.process();
        assert_eq!(
            events,
            vec![FirmwareOutcome::Status(FirmwareStatusMessage {
                status: FirmwareStatus::Success,
                error: None
            })]
        );
        assert_eq!(engine.state(), FirmwareState::Idle);
        assert!(matches!(state.borrow().checkpoint.0, FirmwareCheckpoint::Idle));
    }

    #[test]
    fn failed_installation_reports_error_then_resets() {
        let (state, _host) = fresh_host();
        let host = TestHost(state.clone());
        let mut engine = FirmwareEngine::new(Box::new(host));
        engine.handle_install("fw.bin");
        state.borrow_mut().completed = Some(false);

        let events = engine.process();
        assert!(events.is_empty());
        assert_eq!(engine.state(), FirmwareState::Error);

        let events = engine.process();
        assert_eq!(
            events,
            vec![FirmwareOutcome::Status(FirmwareStatusMessage {
                status: FirmwareStatus::Error,
                error: Some(FirmwareError::InstallationFailed)
            })]
        );
        assert_eq!(engine.state(), FirmwareState::Idle);
    }

    #[test]
    fn abort_during_installation_reports_aborted() {
        let (state, _host) = fresh_host();
        state.borrow_mut().abort_result = true;
        let host = TestHost(state.clone());
        let mut engine = FirmwareEngine::new(Box::new(host));
        engine.handle_install("fw.bin");

        let events = engine.handle_abort();
        assert_eq!(
            events,
            vec![FirmwareOutcome::Status(FirmwareStatusMessage {
                status: FirmwareStatus::Aborted,
                error: None
            })]
        );
    }

    #[test]
    fn abort_failure_reports_error() {
        let (state, _host) = fresh_host();
        state.borrow_mut().abort_result = false;
        let host = TestHost(state.clone());
        let mut engine = FirmwareEngine::new(Box::new(host));
        engine.handle_install("fw.bin");

        let events = engine.handle_abort();
        assert_eq!(
            events,
            vec![FirmwareOutcome::Status(FirmwareStatusMessage {
                status: FirmwareStatus::Error,
                error: Some(FirmwareError::Unknown)
            })]
        );
    }

    #[test]
    fn start_installation_failure_surfaces_as_error_on_next_tick() {
        let (state, _host) = fresh_host();
        state.borrow_mut().start_installation_result = false;
        let host = TestHost(state.clone());
        let mut engine = FirmwareEngine::new(Box::new(host));
        engine.handle_install("fw.bin");
        assert_eq!(engine.state(), FirmwareState::Error);

        let events = engine.process();
        assert_eq!(
            events,
            vec![FirmwareOutcome::Status(FirmwareStatusMessage {
                status: FirmwareStatus::Error,
                error: Some(FirmwareError::Unknown)
            })]
        );
        assert_eq!(engine.state(), FirmwareState::Idle);
    }
}
