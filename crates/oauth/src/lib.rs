//! Access token lifecycle primitives: expiry decisions and the
//! `refresh_token` grant.

pub mod clock;
pub mod expiry;
pub mod refresh;
pub mod types;

pub use {
    clock::{Clock, ManualClock, SystemClock},
    expiry::{ExpiryDecision, ExpiryEvaluator, SAFETY_MARGIN_SECS, evaluate, parse_expiry},
    refresh::{DEFAULT_EXPIRES_IN_SECS, RefreshClient, TokenRefresher},
    types::{Credential, RefreshOutcome, RejectionReason},
};
