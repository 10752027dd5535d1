//! Cross-frame filtering: majority smoothing and hold-to-confirm.

mod confirm;
mod smoother;

pub use confirm::{
    ConfirmPhase, ConfirmationState, HoldToConfirm, DEFAULT_GRACE_PERIOD, DEFAULT_HOLD_TIME,
};
pub use smoother::{AbsentPolicy, TemporalSmoother};
