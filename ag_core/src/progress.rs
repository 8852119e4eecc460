/// Progress of a single transfer, handed to the caller's progress callback.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgressState {
    /// Bytes written so far.
    pub value: u64,
    /// Total bytes expected, when the remote reported a length.
    pub max_value: Option<u64>,
    /// Set on the last update, once the file is in its final place.
    pub is_completed: bool,
}

impl ProgressState {
    pub fn new(max_value: Option<u64>) -> Self {
        Self {
            value: 0,
            max_value,
            is_completed: false,
        }
    }

    pub fn advance(&mut self, bytes: u64) {
        self.value = self.value.saturating_add(bytes);
    }

    /// Completed fraction in `0.0..=1.0`, or `None` without a known total.
    pub fn fraction(&self) -> Option<f64> {
        match self.max_value {
            Some(0) => Some(if self.is_completed { 1.0 } else { 0.0 }),
            Some(max) => Some((self.value as f64 / max as f64).min(1.0)),
            None => None,
        }
    }
}
