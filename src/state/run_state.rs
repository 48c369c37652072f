/// Emission counting against the item quota
use std::fmt;

/// Outcome of recording one emitted record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunProgress {
    /// The quota still has room
    Continue,

    /// This emission reached the quota; the run must abort
    QuotaReached,
}

/// Count of emitted records for the current run
///
/// `emitted` starts at the number of records already in the result store, so
/// a resumed run stops at the same total a single uninterrupted run would.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    emitted: u64,
    quota: Option<u64>,
}

impl RunState {
    /// Creates run state seeded with the prior record count
    pub fn from_prior(prior_count: u64, quota: Option<u64>) -> Self {
        Self {
            emitted: prior_count,
            quota,
        }
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn quota(&self) -> Option<u64> {
        self.quota
    }

    /// Returns true once no further records may be emitted
    pub fn is_exhausted(&self) -> bool {
        match self.quota {
            Some(quota) => self.emitted >= quota,
            None => false,
        }
    }

    /// Counts one successful emission
    pub fn record_emission(&mut self) -> RunProgress {
        self.emitted += 1;
        if self.is_exhausted() {
            RunProgress::QuotaReached
        } else {
            RunProgress::Continue
        }
    }

    /// Records still allowed before the quota is hit
    pub fn remaining(&self) -> Option<u64> {
        self.quota.map(|quota| quota.saturating_sub(self.emitted))
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.quota {
            Some(quota) => write!(f, "{}/{}", self.emitted, quota),
            None => write!(f, "{}", self.emitted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_reached_on_exact_count() {
        let mut state = RunState::from_prior(0, Some(2));
        assert_eq!(state.record_emission(), RunProgress::Continue);
        assert_eq!(state.record_emission(), RunProgress::QuotaReached);
        assert!(state.is_exhausted());
    }

    #[test]
    fn test_prior_count_counts_toward_quota() {
        let mut state = RunState::from_prior(3, Some(5));
        assert_eq!(state.remaining(), Some(2));
        state.record_emission();
        assert_eq!(state.record_emission(), RunProgress::QuotaReached);
        assert_eq!(state.emitted(), 5);
    }

    #[test]
    fn test_exhausted_before_start() {
        let state = RunState::from_prior(10, Some(10));
        assert!(state.is_exhausted());
        assert_eq!(state.remaining(), Some(0));
    }

    #[test]
    fn test_unlimited() {
        let mut state = RunState::from_prior(0, None);
        for _ in 0..1000 {
            assert_eq!(state.record_emission(), RunProgress::Continue);
        }
        assert!(!state.is_exhausted());
        assert_eq!(state.remaining(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(RunState::from_prior(1, Some(4)).to_string(), "1/4");
        assert_eq!(RunState::from_prior(7, None).to_string(), "7");
    }
}
