//! Best-effort step results.
//!
//! Optional steps (the production optimizer, CSS purging) return
//! `Result<T, Degraded<T>>`: the error side still carries a usable output.

/// Fallback output of a best-effort step that did not fully succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Degraded<T> {
    /// Output to use instead.
    pub fallback: T,
    /// Why the step degraded.
    pub reason: String,
}

/// Outcome of a best-effort step.
pub type Outcome<T> = Result<T, Degraded<T>>;

/// Unwrap an outcome, logging a warning when it degraded.
pub(crate) fn settle<T>(outcome: Outcome<T>, step: &str, unit: &str) -> T {
    match outcome {
        Ok(output) => output,
        Err(Degraded { fallback, reason }) => {
            tracing::warn!(unit, step, %reason, "Falling back to degraded output");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_ok() {
        assert_eq!(settle(Ok::<_, Degraded<u8>>(1), "step", "unit"), 1);
    }

    #[test]
    fn test_settle_degraded_returns_fallback() {
        let outcome: Outcome<&str> = Err(Degraded {
            fallback: "raw",
            reason: "boom".to_owned(),
        });
        assert_eq!(settle(outcome, "optimize", "./counter.ts"), "raw");
    }
}
