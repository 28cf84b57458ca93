/// Graceful-shutdown coordination.
///
/// Turns an external interrupt/termination request into a call to the main
/// view's `close()`, so the application exits through its own lifecycle
/// instead of being killed. The coordinator holds at most one registration with
/// its [`SignalHost`]; `enable` and `disable` are idempotent and serialized.
use crate::signals::{Disposition, Interrupt, SignalError, SignalHandler, SignalHost};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

/// The application's primary surface. Closing it starts normal shutdown.
///
/// `close` is called from the signal delivery thread, so implementations must
/// marshal onto their own thread if they need one.
pub trait MainView: Send + Sync {
    fn close(&self);
}

/// How the coordinator treats a signal that arrives with no main view set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownPolicy {
    /// Mark the signal handled even when there is nothing to close.
    /// When false the host's default termination applies instead.
    pub swallow_without_view: bool,
}

type ViewSlot = Arc<RwLock<Option<Weak<dyn MainView>>>>;

/// Owns the single interrupt registration for the process.
pub struct ShutdownCoordinator<H: SignalHost> {
    host: H,
    policy: ShutdownPolicy,
    /// `Some` while hooked.
    registration: Mutex<Option<H::Registration>>,
    view: ViewSlot,
}

impl<H: SignalHost> ShutdownCoordinator<H> {
    pub fn new(host: H, policy: ShutdownPolicy) -> Self {
        Self {
            host,
            policy,
            registration: Mutex::new(None),
            view: Arc::new(RwLock::new(None)),
        }
    }

    /// Start intercepting stop requests. No-op if already hooked.
    pub fn enable(&self) -> Result<(), SignalError> {
        let mut registration = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if registration.is_some() {
            tracing::debug!("shutdown interception already enabled");
            return Ok(());
        }

        let handler = self.handler();
        *registration = Some(self.host.register(handler)?);
        tracing::info!("shutdown interception enabled");
        Ok(())
    }

    /// Stop intercepting stop requests. No-op if not hooked.
    pub fn disable(&self) -> Result<(), SignalError> {
        let mut registration = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(active) = registration.take() else {
            tracing::debug!("shutdown interception not enabled, nothing to disable");
            return Ok(());
        };

        self.host.unregister(active)?;
        tracing::info!("shutdown interception disabled");
        Ok(())
    }

    pub fn is_hooked(&self) -> bool {
        self.registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Point the coordinator at the main view. Only a weak reference is kept;
    /// the caller keeps ownership.
    pub fn set_main_view(&self, view: &Arc<dyn MainView>) {
        *self.view.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::downgrade(view));
    }

    pub fn clear_main_view(&self) {
        *self.view.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn policy(&self) -> ShutdownPolicy {
        self.policy
    }

    fn handler(&self) -> SignalHandler {
        let view = Arc::clone(&self.view);
        let policy = self.policy;
        Arc::new(move |kind| on_signal(&view, policy, kind))
    }
}

impl<H: SignalHost> Drop for ShutdownCoordinator<H> {
    fn drop(&mut self) {
        if let Err(e) = self.disable() {
            tracing::warn!(error = %e, "failed to disable shutdown interception on drop");
        }
    }
}

/// Signal callback body. Runs on the host's delivery thread.
fn on_signal(view: &ViewSlot, policy: ShutdownPolicy, kind: Interrupt) -> Disposition {
    // Upgrade under the lock, close outside it.
    let target = view
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .and_then(Weak::upgrade);

    match target {
        Some(view) => {
            tracing::info!(signal = kind.name(), "stop requested, closing main view");
            view.close();
            Disposition::Handled
        }
        None if policy.swallow_without_view => {
            tracing::warn!(
                signal = kind.name(),
                "stop requested but no main view is set, ignoring"
            );
            Disposition::Handled
        }
        None => {
            tracing::info!(
                signal = kind.name(),
                "stop requested with no main view, falling through to default termination"
            );
            Disposition::Default
        }
    }
}
