//! Bounded retry with a stepped parameter
//!
//! A run tries `attempt(state)` up to `max_attempts` times, advancing the
//! state with `step` between tries, and stops early once `done` accepts a
//! result or an attempt fails.

/// Why a retry run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason<E> {
    Satisfied,
    Exhausted,
    Failed(E),
}

#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// Last successful result, if any attempt succeeded.
    pub last: Option<T>,
    /// Number of attempts started, including a failed one.
    pub attempts: usize,
    pub stop: StopReason<E>,
}

impl<T, E> RetryOutcome<T, E> {
    pub fn is_satisfied(&self) -> bool {
        matches!(self.stop, StopReason::Satisfied)
    }
}

pub struct BoundedRetry<S, F> {
    start: S,
    max_attempts: usize,
    step: F,
}

impl<S, F> BoundedRetry<S, F>
where
    S: Copy,
    F: Fn(S) -> S,
{
    pub fn new(start: S, max_attempts: usize, step: F) -> Self {
        Self {
            start,
            max_attempts,
            step,
        }
    }

    /// The states the run would try, in order, if nothing stopped it early.
    pub fn schedule(&self) -> Vec<S> {
        let mut states = Vec::with_capacity(self.max_attempts);
        let mut state = self.start;
        for i in 0..self.max_attempts {
            if i > 0 {
                state = (self.step)(state);
            }
            states.push(state);
        }
        states
    }

    pub fn run<T, E>(
        &self,
        mut attempt: impl FnMut(S) -> Result<T, E>,
        done: impl Fn(&T) -> bool,
    ) -> RetryOutcome<T, E> {
        let mut last = None;
        let mut attempts = 0;

        for state in self.schedule() {
            attempts += 1;
            match attempt(state) {
                Ok(value) => {
                    let finished = done(&value);
                    last = Some(value);
                    if finished {
                        return RetryOutcome {
                            last,
                            attempts,
                            stop: StopReason::Satisfied,
                        };
                    }
                }
                Err(e) => {
                    return RetryOutcome {
                        last,
                        attempts,
                        stop: StopReason::Failed(e),
                    };
                }
            }
        }

        RetryOutcome {
            last,
            attempts,
            stop: StopReason::Exhausted,
        }
    }
}
