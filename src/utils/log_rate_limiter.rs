use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub should_emit: bool,
    pub suppressed_so_far: u64,
}

#[derive(Debug, Clone, Default)]
struct LimiterState {
    emitted: u64,
    suppressed: u64,
}

/// Caps how many log lines a single key may produce during one pass.
///
/// Lives for one run only; counts are dropped with it.
#[derive(Debug, Clone)]
pub struct LogRateLimiter {
    max_per_key: u64,
    states: HashMap<String, LimiterState>,
}

impl LogRateLimiter {
    pub fn new(max_per_key: u64) -> Self {
        Self {
            max_per_key,
            states: HashMap::new(),
        }
    }

    pub fn should_emit(&mut self, key: &str) -> RateLimitDecision {
        let state = self.states.entry(key.to_string()).or_default();

        if state.emitted < self.max_per_key {
            state.emitted += 1;
            RateLimitDecision {
                should_emit: true,
                suppressed_so_far: state.suppressed,
            }
        } else {
            state.suppressed = state.suppressed.saturating_add(1);
            RateLimitDecision {
                should_emit: false,
                suppressed_so_far: state.suppressed,
            }
        }
    }

    /// Keys that had lines suppressed, with the number dropped
    pub fn suppressed(&self) -> Vec<(String, u64)> {
        let mut out: Vec<(String, u64)> = self
            .states
            .iter()
            .filter(|(_, state)| state.suppressed > 0)
            .map(|(key, state)| (key.clone(), state.suppressed))
            .collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_up_to_budget_then_suppresses() {
        let mut limiter = LogRateLimiter::new(2);
        assert!(limiter.should_emit("not_an_object").should_emit);
        assert!(limiter.should_emit("not_an_object").should_emit);
        let third = limiter.should_emit("not_an_object");
        assert!(!third.should_emit);
        assert_eq!(third.suppressed_so_far, 1);
        assert_eq!(limiter.suppressed(), vec![("not_an_object".to_string(), 1)]);
    }

    #[test]
    fn keys_have_independent_budgets() {
        let mut limiter = LogRateLimiter::new(1);
        assert!(limiter.should_emit("a").should_emit);
        assert!(limiter.should_emit("b").should_emit);
        assert!(!limiter.should_emit("a").should_emit);
        assert_eq!(limiter.suppressed(), vec![("a".to_string(), 1)]);
    }

    #[test]
    fn zero_budget_suppresses_everything() {
        let mut limiter = LogRateLimiter::new(0);
        assert!(!limiter.should_emit("a").should_emit);
    }
}
