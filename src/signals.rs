/// Host signal delivery for interrupt/termination requests.
///
/// SIGINT (Ctrl-C) and SIGTERM are both treated as the single "stop requested"
/// notification. A [`SignalHost`] registers one handler for them, deregisters it,
/// and honours the handler's [`Disposition`]: `Handled` suppresses the default
/// termination, `Default` lets the process die as it normally would.
use nix::sys::signal::Signal;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use signal_hook::SigId;
use std::os::raw::c_int;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

const TERM_SIGNALS: [c_int; 2] = [SIGINT, SIGTERM];

/// Which stop request the host delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// Usually Ctrl-C at the terminal.
    Sigint,
    /// Usually a supervisor or `kill`.
    Sigterm,
}

impl Interrupt {
    fn from_raw(raw: c_int) -> Option<Self> {
        match Signal::try_from(raw).ok()? {
            Signal::SIGINT => Some(Interrupt::Sigint),
            Signal::SIGTERM => Some(Interrupt::Sigterm),
            _ => None,
        }
    }

    /// The OS signal this request arrives as.
    pub fn signal(self) -> Signal {
        match self {
            Interrupt::Sigint => Signal::SIGINT,
            Interrupt::Sigterm => Signal::SIGTERM,
        }
    }

    pub fn name(self) -> &'static str {
        self.signal().as_str()
    }
}

/// What the host should do after a handler has seen a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The application takes care of shutting down; skip default termination.
    Handled,
    /// Apply the default behaviour (terminate the process).
    Default,
}

/// Callback invoked by the host on the delivery thread.
pub type SignalHandler = Arc<dyn Fn(Interrupt) -> Disposition + Send + Sync>;

/// Errors from registering or deregistering a signal handler.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("failed to register signal handler: {source}")]
    Register {
        #[source]
        source: std::io::Error,
    },
    #[error("signal delivery thread panicked")]
    DeliveryThreadPanicked,
}

/// The register/deregister side of host signal delivery.
pub trait SignalHost: Send + Sync {
    /// Token for an active registration, handed back to `unregister`.
    type Registration: Send;

    fn register(&self, handler: SignalHandler) -> Result<Self::Registration, SignalError>;

    fn unregister(&self, registration: Self::Registration) -> Result<(), SignalError>;
}

/// Signal host backed by the real process signal dispositions.
///
/// Handlers run on a dedicated `lifeline-signals` thread, never on the thread
/// that called `register`. Keep at most one alive at a time: while nothing is
/// registered it keeps the default terminate behaviour in force.
pub struct ProcessSignals {
    /// True whenever no handler is accepting signals; the default action runs then.
    passthrough: Arc<AtomicBool>,
    /// Conditional-default actions owned by this host, removed on drop.
    fallbacks: Vec<SigId>,
}

/// Active registration on a [`ProcessSignals`] host.
pub struct ProcessRegistration {
    handle: Handle,
    thread: JoinHandle<()>,
}

/// Restores passthrough when the delivery thread exits for any reason,
/// including a panicking handler.
struct PassthroughGuard(Arc<AtomicBool>);

impl Drop for PassthroughGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl ProcessSignals {
    pub fn new() -> Result<Self, SignalError> {
        let mut host = Self {
            passthrough: Arc::new(AtomicBool::new(true)),
            fallbacks: Vec::with_capacity(TERM_SIGNALS.len()),
        };
        // On error `host` drops and removes whatever was already installed.
        for sig in TERM_SIGNALS {
            let id =
                signal_hook::flag::register_conditional_default(sig, Arc::clone(&host.passthrough))
                    .map_err(|source| SignalError::Register { source })?;
            host.fallbacks.push(id);
        }
        Ok(host)
    }
}

impl Drop for ProcessSignals {
    fn drop(&mut self) {
        for id in self.fallbacks.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}

impl SignalHost for ProcessSignals {
    type Registration = ProcessRegistration;

    fn register(&self, handler: SignalHandler) -> Result<ProcessRegistration, SignalError> {
        let mut signals =
            Signals::new(TERM_SIGNALS).map_err(|source| SignalError::Register { source })?;
        let handle = signals.handle();
        let passthrough = Arc::clone(&self.passthrough);
        // From here on the iterator queues signals for the thread below.
        self.passthrough.store(false, Ordering::SeqCst);

        let thread = std::thread::Builder::new()
            .name("lifeline-signals".to_string())
            .spawn(move || {
                let guard = PassthroughGuard(passthrough);
                for raw in signals.forever() {
                    let Some(kind) = Interrupt::from_raw(raw) else {
                        continue;
                    };
                    match handler(kind) {
                        Disposition::Handled => {
                            tracing::debug!(signal = kind.name(), "default termination suppressed");
                        }
                        Disposition::Default => {
                            tracing::info!(signal = kind.name(), "applying default signal action");
                            guard.0.store(true, Ordering::SeqCst);
                            if let Err(e) = signal_hook::low_level::emulate_default_handler(raw) {
                                tracing::warn!(error = %e, "failed to apply default signal action");
                            }
                        }
                    }
                }
            })
            .map_err(|source| {
                self.passthrough.store(true, Ordering::SeqCst);
                SignalError::Register { source }
            })?;

        Ok(ProcessRegistration { handle, thread })
    }

    fn unregister(&self, registration: ProcessRegistration) -> Result<(), SignalError> {
        self.passthrough.store(true, Ordering::SeqCst);
        registration.handle.close();
        if registration.thread.thread().id() == std::thread::current().id() {
            // Called from inside the handler; the loop ends once it returns.
            tracing::debug!("deregistered from the delivery thread, not joining");
            return Ok(());
        }
        registration
            .thread
            .join()
            .map_err(|_| SignalError::DeliveryThreadPanicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::{MainView, ShutdownCoordinator, ShutdownPolicy};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_interrupt_from_raw() {
        assert_eq!(Interrupt::from_raw(SIGINT), Some(Interrupt::Sigint));
        assert_eq!(Interrupt::from_raw(SIGTERM), Some(Interrupt::Sigterm));
        assert_eq!(Interrupt::from_raw(Signal::SIGHUP as c_int), None);
    }

    #[test]
    fn test_interrupt_names() {
        assert_eq!(Interrupt::Sigint.name(), "SIGINT");
        assert_eq!(Interrupt::Sigterm.name(), "SIGTERM");
    }

    #[test]
    fn test_passthrough_guard_restores_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        drop(PassthroughGuard(Arc::clone(&flag)));
        assert!(flag.load(Ordering::SeqCst));
    }

    const CHILD_ENV: &str = "LIFELINE_SIGNALS_CHILD";

    // Tests that raise real signals run in a child copy of this test binary,
    // one test per process, so signal-hook state and fatal signals stay isolated.
    fn in_child(test: &str) -> bool {
        std::env::var(CHILD_ENV).as_deref() == Ok(test)
    }

    fn run_in_child(test: &str) -> std::process::ExitStatus {
        std::process::Command::new(std::env::current_exe().unwrap())
            .args([test, "--exact", "--test-threads=1"])
            .env(CHILD_ENV, test)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .unwrap()
    }

    fn recording_handler(
        disposition: Disposition,
    ) -> (SignalHandler, mpsc::Receiver<(Interrupt, Option<String>)>) {
        let (tx, rx) = mpsc::channel();
        let tx = std::sync::Mutex::new(tx);
        let handler: SignalHandler = Arc::new(move |kind| {
            let thread_name = std::thread::current().name().map(str::to_string);
            let _ = tx.lock().unwrap().send((kind, thread_name));
            disposition
        });
        (handler, rx)
    }

    #[test]
    fn test_process_signals_delivers_and_suppresses_default() {
        const NAME: &str = "signals::tests::test_process_signals_delivers_and_suppresses_default";
        if !in_child(NAME) {
            assert!(run_in_child(NAME).success());
            return;
        }

        let host = ProcessSignals::new().unwrap();
        let (handler, rx) = recording_handler(Disposition::Handled);

        let registration = host.register(handler).unwrap();
        assert!(!host.passthrough.load(Ordering::SeqCst));

        nix::sys::signal::raise(Signal::SIGTERM).unwrap();

        let (kind, thread_name) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(kind, Interrupt::Sigterm);
        assert_eq!(thread_name.as_deref(), Some("lifeline-signals"));

        host.unregister(registration).unwrap();
        assert!(host.passthrough.load(Ordering::SeqCst));
    }

    #[test]
    fn test_default_disposition_terminates_process() {
        use std::os::unix::process::ExitStatusExt;

        const NAME: &str = "signals::tests::test_default_disposition_terminates_process";
        if !in_child(NAME) {
            let status = run_in_child(NAME);
            assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
            return;
        }

        let host = ProcessSignals::new().unwrap();
        let (handler, rx) = recording_handler(Disposition::Default);
        let _registration = host.register(handler).unwrap();

        nix::sys::signal::raise(Signal::SIGTERM).unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        // The delivery thread now re-raises with the default action.
        std::thread::sleep(Duration::from_secs(5));
        // Still alive: the parent sees a clean exit and fails.
    }

    #[test]
    fn test_new_host_after_drop_still_intercepts() {
        const NAME: &str = "signals::tests::test_new_host_after_drop_still_intercepts";
        if !in_child(NAME) {
            assert!(run_in_child(NAME).success());
            return;
        }

        drop(ProcessSignals::new().unwrap());

        let host = ProcessSignals::new().unwrap();
        let (handler, rx) = recording_handler(Disposition::Handled);
        let registration = host.register(handler).unwrap();

        nix::sys::signal::raise(Signal::SIGTERM).unwrap();
        let (kind, _) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(kind, Interrupt::Sigterm);

        host.unregister(registration).unwrap();
    }

    /// Main view whose close runs the full cleanup, as an application would.
    struct DisablingView {
        coordinator: std::sync::OnceLock<Arc<ShutdownCoordinator<ProcessSignals>>>,
        results: std::sync::Mutex<mpsc::Sender<(bool, bool)>>,
    }

    impl MainView for DisablingView {
        fn close(&self) {
            let coordinator = self.coordinator.get().unwrap();
            let disabled = coordinator.disable().is_ok();
            let _ = self
                .results
                .lock()
                .unwrap()
                .send((disabled, coordinator.is_hooked()));
        }
    }

    #[test]
    fn test_disable_from_inside_close() {
        const NAME: &str = "signals::tests::test_disable_from_inside_close";
        if !in_child(NAME) {
            assert!(run_in_child(NAME).success());
            return;
        }

        let (tx, rx) = mpsc::channel();
        let view = Arc::new(DisablingView {
            coordinator: std::sync::OnceLock::new(),
            results: std::sync::Mutex::new(tx),
        });
        let coordinator = Arc::new(ShutdownCoordinator::new(
            ProcessSignals::new().unwrap(),
            ShutdownPolicy::default(),
        ));
        let _ = view.coordinator.set(Arc::clone(&coordinator));
        let main_view: Arc<dyn MainView> = view.clone();
        coordinator.set_main_view(&main_view);
        coordinator.enable().unwrap();

        nix::sys::signal::raise(Signal::SIGTERM).unwrap();

        let (disabled, still_hooked) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(disabled);
        assert!(!still_hooked);
        assert!(!coordinator.is_hooked());
        coordinator.disable().unwrap();
    }
}
