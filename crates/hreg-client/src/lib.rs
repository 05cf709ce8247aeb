//! Client-side handle validation.
//!
//! [`UsernameValidator`] turns keystrokes into at most one availability
//! probe per pause in typing. Format problems are reported immediately and
//! for free; only well-formed, changed candidates reach the probe, and only
//! after the input has been stable for the debounce delay.
//!
//! - [`debounce`]: generic [`Debouncer`] on the Tokio runtime
//! - [`validator`]: the [`UsernameValidator`] state machine and its
//!   [`ValidationObserver`] callbacks
//! - [`config`]: [`ValidatorConfig`]

pub mod config;
pub mod debounce;
pub mod validator;

pub use config::ValidatorConfig;
pub use debounce::Debouncer;
pub use validator::{
    AvailabilityError, NoOpObserver, UsernameValidator, ValidationObserver, ValidationResult,
    ValidationState, Verdict,
};
