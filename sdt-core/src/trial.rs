use serde::{Deserialize, Serialize};

/// Reaction time written when no response was given. Never a measured value.
pub const NO_RESPONSE_RT_MS: f64 = -1.0;

/// Outcome of one response window, in session-clock nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapturedResponse {
    pub pressed: bool,
    pub captured_at: Option<u64>,
}

impl CapturedResponse {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn at(timestamp_ns: u64) -> Self {
        Self {
            pressed: true,
            captured_at: Some(timestamp_ns),
        }
    }
}

/// Recorded result per non-dummy stimulus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub block: usize,
    /// 1-based position in the block; the dummy occupies position 0.
    pub position: usize,
    pub word: String,
    pub track: usize,
    pub list: usize,
    pub pressed: bool,
    pub reaction_time_ms: f64,
}

impl ResponseRecord {
    /// Latency is measured from the committed onset frame.
    pub fn reaction_time_ms(response: &CapturedResponse, onset_ns: u64) -> f64 {
        match (response.pressed, response.captured_at) {
            (true, Some(at)) => at.saturating_sub(onset_ns) as f64 / 1_000_000.0,
            _ => NO_RESPONSE_RT_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_is_relative_to_onset() {
        let rt = ResponseRecord::reaction_time_ms(&CapturedResponse::at(3_500_000), 1_000_000);
        assert!((rt - 2.5).abs() < 1e-9);
    }

    #[test]
    fn missing_response_uses_sentinel() {
        let rt = ResponseRecord::reaction_time_ms(&CapturedResponse::none(), 1_000_000);
        assert_eq!(rt, NO_RESPONSE_RT_MS);
    }
}
