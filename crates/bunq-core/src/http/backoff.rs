/*
[INPUT]:  Retry policy (initial/max interval, total budget, multiplier)
[OUTPUT]: Wait-or-stop decisions for one logical retry loop
[POS]:    HTTP layer - retry pacing for rate-limited and server-error responses
[UPDATE]: When changing default retry budget or interval growth
*/

use std::time::Duration;

use tokio::time::Instant;

const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(4);
const DEFAULT_MAX_ELAPSED: Duration = Duration::from_secs(12);
const DEFAULT_MULTIPLIER: f64 = 1.25;
const FALLBACK_MULTIPLIER: f64 = 1.1;

/// Outcome of asking the backoff for the next interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the duration, then try again
    Wait(Duration),
    /// Retry budget is spent
    Stop,
}

/// Retry policy parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    /// `None` disables the total elapsed-time limit.
    pub max_elapsed: Option<Duration>,
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval: DEFAULT_INITIAL_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
            max_elapsed: Some(DEFAULT_MAX_ELAPSED),
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl BackoffConfig {
    /// Build a fresh backoff state machine from this policy
    pub fn build(&self) -> Backoff {
        Backoff::new(
            self.initial_interval,
            self.max_interval,
            self.max_elapsed,
            self.multiplier,
        )
    }
}

/// Exponential backoff with an interval cap and a total time budget.
///
/// The elapsed-time clock starts on the first call to [`Backoff::next_interval`],
/// not at construction, so a backoff can be created ahead of the first attempt.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial_interval: Duration,
    max_interval: Duration,
    max_elapsed: Option<Duration>,
    multiplier: f64,

    current_interval: Duration,
    start_time: Option<Instant>,
    attempt: u32,
}

impl Backoff {
    /// Create a backoff. Multipliers `<= 1` are replaced with 1.1.
    pub fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_elapsed: Option<Duration>,
        multiplier: f64,
    ) -> Self {
        let multiplier = if multiplier.is_finite() && multiplier > 1.0 {
            multiplier
        } else {
            FALLBACK_MULTIPLIER
        };

        Self {
            initial_interval,
            max_interval,
            max_elapsed: max_elapsed.filter(|limit| !limit.is_zero()),
            multiplier,
            current_interval: initial_interval,
            start_time: None,
            attempt: 0,
        }
    }

    /// 1s initial, 4s cap, 12s budget, x1.25
    pub fn with_defaults() -> Self {
        BackoffConfig::default().build()
    }

    /// Number of intervals handed out since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Multiplier actually in effect
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Next interval to wait, or [`RetryDecision::Stop`] when waiting it would
    /// reach the total budget.
    pub fn next_interval(&mut self) -> RetryDecision {
        let now = Instant::now();
        let start = *self.start_time.get_or_insert(now);
        let interval = self.current_interval;

        if let Some(limit) = self.max_elapsed {
            match now.duration_since(start).checked_add(interval) {
                Some(total) if total < limit => {}
                _ => return RetryDecision::Stop,
            }
        }

        let grown = Duration::try_from_secs_f64(interval.as_secs_f64() * self.multiplier);
        self.current_interval = grown.map_or(self.max_interval, |next| next.min(self.max_interval));
        self.attempt += 1;
        RetryDecision::Wait(interval)
    }

    /// Restore the initial interval and clear the clock and attempt counter
    pub fn reset(&mut self) {
        self.start_time = None;
        self.current_interval = self.initial_interval;
        self.attempt = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[rstest]
    #[case(1.0)]
    #[case(0.5)]
    #[case(0.0)]
    #[case(-3.0)]
    #[case(f64::NAN)]
    fn test_non_increasing_multiplier_is_replaced(#[case] multiplier: f64) {
        let mut backoff = Backoff::new(ms(100), ms(1_000), None, multiplier);
        assert_eq!(backoff.multiplier(), FALLBACK_MULTIPLIER);

        let mut previous = Duration::ZERO;
        loop {
            let RetryDecision::Wait(interval) = backoff.next_interval() else {
                panic!("no budget configured, backoff must not stop");
            };
            if interval == ms(1_000) {
                break;
            }
            assert!(interval > previous, "{interval:?} <= {previous:?}");
            previous = interval;
        }
        assert_eq!(backoff.next_interval(), RetryDecision::Wait(ms(1_000)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_sequence_is_clamped() {
        let mut backoff = Backoff::new(ms(1_000), ms(4_000), None, 1.25);
        let expected = [1_000, 1_250, 1_562, 1_953, 2_441, 3_051, 3_814, 4_000, 4_000];

        for want in expected {
            match backoff.next_interval() {
                RetryDecision::Wait(interval) => assert_eq!(interval.as_millis() as u64, want),
                RetryDecision::Stop => panic!("unexpected stop"),
            }
        }
        assert_eq!(backoff.attempt(), expected.len() as u32);
    }

    #[rstest]
    #[case(Backoff::with_defaults())]
    #[case(Backoff::new(ms(50), ms(400), Some(ms(1_000)), 2.0))]
    #[case(Backoff::new(ms(300), ms(300), Some(ms(1_000)), 1.0))]
    #[tokio::test(start_paused = true)]
    async fn test_waited_total_never_exceeds_budget(#[case] mut backoff: Backoff) {
        let budget = backoff.max_elapsed.expect("budget");
        let mut waited = Duration::ZERO;

        while let RetryDecision::Wait(interval) = backoff.next_interval() {
            tokio::time::advance(interval).await;
            waited += interval;
        }

        assert!(waited <= budget, "waited {waited:?} with budget {budget:?}");
        assert!(waited > Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_restores_initial_interval() {
        let mut backoff = Backoff::new(ms(200), ms(1_000), Some(ms(2_000)), 1.5);

        while let RetryDecision::Wait(interval) = backoff.next_interval() {
            tokio::time::advance(interval).await;
        }
        assert_eq!(backoff.next_interval(), RetryDecision::Stop);

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_interval(), RetryDecision::Wait(ms(200)));
        assert_eq!(backoff.attempt(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_starts_on_first_call() {
        let mut backoff = Backoff::new(ms(100), ms(100), Some(ms(150)), 2.0);
        tokio::time::advance(ms(10_000)).await;

        assert_eq!(backoff.next_interval(), RetryDecision::Wait(ms(100)));
        tokio::time::advance(ms(100)).await;
        assert_eq!(backoff.next_interval(), RetryDecision::Stop);
    }

    #[test]
    fn test_huge_intervals_do_not_overflow() {
        let mut bounded = Backoff::new(Duration::MAX, Duration::MAX, Some(ms(1_000)), 2.0);
        assert_eq!(bounded.next_interval(), RetryDecision::Stop);

        let mut growing = Backoff::new(ms(1), Duration::MAX, Some(Duration::MAX), f64::MAX);
        assert_eq!(growing.next_interval(), RetryDecision::Wait(ms(1)));
        std::thread::sleep(ms(2));
        assert_eq!(growing.next_interval(), RetryDecision::Stop);

        let mut unbounded = Backoff::new(Duration::MAX, ms(5_000), None, 2.0);
        assert_eq!(unbounded.next_interval(), RetryDecision::Wait(Duration::MAX));
        assert_eq!(unbounded.next_interval(), RetryDecision::Wait(ms(5_000)));
    }

    #[test]
    fn test_zero_budget_means_unbounded() {
        let mut backoff = Backoff::new(ms(1), ms(1), Some(Duration::ZERO), 2.0);
        for _ in 0..100 {
            assert_eq!(backoff.next_interval(), RetryDecision::Wait(ms(1)));
        }
    }
}
