//! Well-known phase names.

/// Synthetic phase every manager starts in.
pub const NOT_IN_LIFECYCLE: &str = "not in lifecycle";

/// Initialisation phase.
pub const INITIALISE: &str = "initialise";

/// Start phase.
pub const START: &str = "start";

/// Stop phase.
pub const STOP: &str = "stop";

/// Disposal phase.
pub const DISPOSE: &str = "dispose";

/// Returns the phase whose completion is invalidated when `phase` completes.
///
/// `start`/`stop` invalidate each other; `dispose` invalidates `initialise`.
#[must_use]
pub fn opposing_phase(phase: &str) -> Option<&'static str> {
    match phase {
        START => Some(STOP),
        STOP => Some(START),
        DISPOSE => Some(INITIALISE),
        _ => None,
    }
}
