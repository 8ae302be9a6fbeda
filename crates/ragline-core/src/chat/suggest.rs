//! Admission control for autocomplete requests.

use ragline_types::chat::TurnPhase;

/// Decides whether a suggestion call may be made.
///
/// A call is refused when the feature is disabled, the partial input is
/// blank, a turn is in progress, or another suggestion call is in flight.
#[derive(Debug, Clone, Default)]
pub struct SuggestionGate {
    enabled: bool,
    in_flight: bool,
}

impl SuggestionGate {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            in_flight: false,
        }
    }

    pub fn admit(&self, partial: &str, phase: TurnPhase) -> bool {
        self.enabled && !self.in_flight && phase.is_idle() && !partial.trim().is_empty()
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn begin(&mut self) {
        self.in_flight = true;
    }

    pub fn finish(&mut self) {
        self.in_flight = false;
    }
}
