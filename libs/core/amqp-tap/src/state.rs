use serde::Serialize;
use strum::Display;

/// Lifecycle of a [`Tap`](crate::Tap).
///
/// ```text
/// idle -> opening -> open -> closing -> closed
///            |        |
///            +--------+---> error
/// ```
///
/// `closed` and `error` are terminal. A tap is used for exactly one
/// open/close cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TapState {
    #[default]
    Idle,
    Opening,
    Open,
    Closing,
    Closed,
    Error,
}

impl TapState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: TapState) -> bool {
        use TapState::*;
        matches!(
            (self, next),
            (Idle, Opening)
                | (Idle, Closing)
                | (Opening, Open)
                | (Opening, Error)
                | (Open, Closing)
                | (Open, Error)
                | (Closing, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TapState::Closed | TapState::Error)
    }
}
