//! Validate-as-you-type state machine.
//!
//! Each [`UsernameValidator::validate`] call starts a new epoch. Format
//! problems and "unchanged" inputs are reported synchronously; everything
//! else waits out the debounce delay and then runs the caller's
//! availability probe. Results from superseded epochs are dropped, so the
//! observer only ever hears about the latest input.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hreg_types::{validate_format, FormatViolation};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::config::ValidatorConfig;
use crate::debounce::Debouncer;

/// Where the validator is in handling the latest input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationState {
    Idle,
    Validating,
    FormatRejected,
    FormatAccepted,
    Debouncing,
    CheckingAvailability,
    Complete { valid: bool },
    /// The availability probe failed; the input's validity is unknown.
    Errored,
}

/// Outcome for one candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Available,
    /// The candidate is the owner's current handle.
    Unchanged,
    Taken,
    Rejected(FormatViolation),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Available | Verdict::Unchanged)
    }

    /// Stable message key for display.
    pub fn code(&self) -> &'static str {
        match self {
            Verdict::Available => "available",
            Verdict::Unchanged => "unchanged",
            Verdict::Taken => "taken",
            Verdict::Rejected(violation) => violation.code(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationResult {
    /// The trimmed candidate.
    pub candidate: String,
    pub verdict: Verdict,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.verdict.is_valid()
    }
}

/// A failed availability probe, normalized.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AvailabilityError {
    #[error("availability check failed: {0}")]
    Probe(String),

    #[error("availability check panicked: {0}")]
    Panicked(String),
}

impl AvailabilityError {
    pub fn code(&self) -> &'static str {
        "availabilityCheckFailed"
    }
}

/// Lifecycle callbacks. All methods default to no-ops.
///
/// Callbacks for the immediate outcomes (format rejection, unchanged) run
/// synchronously inside `validate`; the availability callbacks run on the
/// validator's background task while it holds the validator's epoch lock,
/// so a newer `validate` or `cancel` waits for them to finish. They must not
/// call back into the validator.
pub trait ValidationObserver: Send + Sync {
    fn on_validation_start(&self, _candidate: &str) {}

    fn on_validation_complete(&self, _result: &ValidationResult) {}

    fn on_availability_check_start(&self, _candidate: &str) {}

    fn on_availability_check_complete(&self, _candidate: &str, _available: bool) {}

    fn on_error(&self, _candidate: &str, _error: &AvailabilityError) {}
}

/// Observer that ignores everything.
pub struct NoOpObserver;

impl ValidationObserver for NoOpObserver {}

type ProbeFuture = Pin<Box<dyn Future<Output = Result<bool, AvailabilityError>> + Send>>;

struct PendingCheck {
    epoch: u64,
    candidate: String,
    probe: Box<dyn FnOnce(String) -> ProbeFuture + Send>,
}

struct Shared {
    observer: Arc<dyn ValidationObserver>,
    epoch: Mutex<u64>,
    state: Mutex<ValidationState>,
    current: Mutex<Option<String>>,
}

impl Shared {
    fn next_epoch(&self) -> u64 {
        let mut epoch = self.epoch.lock().expect("lock poisoned");
        *epoch += 1;
        *epoch
    }

    /// Run `report` only if `epoch` is still the latest. The epoch lock is
    /// held throughout, so the input cannot move on mid-report.
    fn report_if_current(&self, epoch: u64, report: impl FnOnce()) -> bool {
        let latest = self.epoch.lock().expect("lock poisoned");
        if *latest != epoch {
            return false;
        }
        report();
        true
    }

    fn set_state(&self, state: ValidationState) {
        *self.state.lock().expect("lock poisoned") = state;
    }

    fn complete(&self, candidate: &str, verdict: Verdict) {
        self.set_state(ValidationState::Complete {
            valid: verdict.is_valid(),
        });
        self.observer.on_validation_complete(&ValidationResult {
            candidate: candidate.to_string(),
            verdict,
        });
    }

    async fn run_check(&self, check: PendingCheck) {
        let PendingCheck {
            epoch,
            candidate,
            probe,
        } = check;
        let started = self.report_if_current(epoch, || {
            self.set_state(ValidationState::CheckingAvailability);
            self.observer.on_availability_check_start(&candidate);
        });
        if !started {
            return;
        }
        debug!(candidate = %candidate, epoch, "availability check started");

        // The probe runs on its own task so a panic inside it is contained.
        // If this task is aborted by a newer input, the guard aborts the
        // probe too.
        let task = tokio::spawn(probe(candidate.clone()));
        let _guard = AbortOnDrop(task.abort_handle());
        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => Err(AvailabilityError::Panicked(panic_message(
                e.into_panic(),
            ))),
            Err(_) => Err(AvailabilityError::Probe(
                "availability check was cancelled".to_string(),
            )),
        };

        let reported = self.report_if_current(epoch, || match outcome {
            Ok(available) => {
                self.observer
                    .on_availability_check_complete(&candidate, available);
                let verdict = if available {
                    Verdict::Available
                } else {
                    Verdict::Taken
                };
                self.complete(&candidate, verdict);
            }
            Err(error) => {
                warn!(candidate = %candidate, error = %error, "availability check failed");
                self.set_state(ValidationState::Errored);
                self.observer.on_error(&candidate, &error);
            }
        });
        if !reported {
            debug!(candidate = %candidate, epoch, "dropping stale availability result");
        }
    }
}

struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn normalize(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Debounced, cancelable handle validation for one input field.
///
/// Availability checks are spawned onto the current Tokio runtime, so
/// `validate` must be called from within one whenever the candidate is
/// well formed and differs from the current handle.
pub struct UsernameValidator {
    shared: Arc<Shared>,
    debouncer: Debouncer<PendingCheck>,
}

impl UsernameValidator {
    pub fn new(current: Option<&str>, observer: Arc<dyn ValidationObserver>) -> Self {
        Self::with_config(current, observer, ValidatorConfig::default())
    }

    pub fn with_config(
        current: Option<&str>,
        observer: Arc<dyn ValidationObserver>,
        config: ValidatorConfig,
    ) -> Self {
        let shared = Arc::new(Shared {
            observer,
            epoch: Mutex::new(0),
            state: Mutex::new(ValidationState::Idle),
            current: Mutex::new(current.and_then(normalize)),
        });
        let worker = Arc::clone(&shared);
        let debouncer = Debouncer::new(config.debounce(), move |check: PendingCheck| {
            let shared = Arc::clone(&worker);
            async move { shared.run_check(check).await }
        });
        Self { shared, debouncer }
    }

    /// Validate `candidate` with the configured debounce delay.
    pub fn validate<P, Fut, E>(&self, candidate: &str, probe: P)
    where
        P: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<bool, E>> + Send + 'static,
        E: std::fmt::Display,
    {
        self.validate_with_delay(candidate, probe, self.debouncer.delay());
    }

    /// Validate `candidate`, waiting `delay` before probing availability.
    ///
    /// `probe` receives the trimmed candidate and resolves to whether it is
    /// free. It is only invoked if this call is still the latest one when
    /// the delay elapses.
    pub fn validate_with_delay<P, Fut, E>(&self, candidate: &str, probe: P, delay: Duration)
    where
        P: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<bool, E>> + Send + 'static,
        E: std::fmt::Display,
    {
        let epoch = self.shared.next_epoch();
        self.debouncer.cancel();

        let Some(candidate) = normalize(candidate) else {
            self.shared.set_state(ValidationState::Idle);
            return;
        };

        self.shared.set_state(ValidationState::Validating);
        self.shared.observer.on_validation_start(&candidate);

        if let Err(violation) = validate_format(&candidate) {
            debug!(candidate = %candidate, code = violation.code(), "format rejected");
            self.shared.set_state(ValidationState::FormatRejected);
            self.shared.observer.on_validation_complete(&ValidationResult {
                candidate,
                verdict: Verdict::Rejected(violation),
            });
            return;
        }
        self.shared.set_state(ValidationState::FormatAccepted);

        let unchanged = self
            .shared
            .current
            .lock()
            .expect("lock poisoned")
            .as_deref()
            == Some(candidate.as_str());
        if unchanged {
            self.shared.complete(&candidate, Verdict::Unchanged);
            return;
        }

        self.shared.set_state(ValidationState::Debouncing);
        let probe: Box<dyn FnOnce(String) -> ProbeFuture + Send> = Box::new(move |c| -> ProbeFuture {
            Box::pin(async move {
                probe(c)
                    .await
                    .map_err(|e| AvailabilityError::Probe(e.to_string()))
            })
        });
        self.debouncer.call_after(
            PendingCheck {
                epoch,
                candidate,
                probe,
            },
            delay,
        );
    }

    /// Drop any pending or in-flight check without reporting it.
    pub fn cancel(&self) {
        self.shared.next_epoch();
        self.debouncer.cancel();
        self.shared.set_state(ValidationState::Idle);
    }

    /// Replace the owner's current handle, e.g. after a successful rename.
    /// An empty string clears it.
    pub fn update_current_username(&self, handle: &str) {
        *self.shared.current.lock().expect("lock poisoned") = normalize(handle);
    }

    pub fn current_username(&self) -> Option<String> {
        self.shared.current.lock().expect("lock poisoned").clone()
    }

    pub fn state(&self) -> ValidationState {
        *self.shared.state.lock().expect("lock poisoned")
    }

    /// `true` while a check is waiting out its debounce delay.
    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }
}

impl std::fmt::Debug for UsernameValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsernameValidator")
            .field("state", &self.state())
            .field("current", &self.current_username())
            .finish_non_exhaustive()
    }
}
