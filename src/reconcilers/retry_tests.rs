// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the requeue backoff.

#[cfg(test)]
mod tests {
    use super::super::*;

    fn key(name: &str) -> ReconcileKey {
        ReconcileKey::new("default", name)
    }

    fn backoff() -> ErrorBackoff {
        ErrorBackoff::new(Duration::from_secs(5), Duration::from_secs(300), 0.0)
    }

    #[test]
    fn test_default_configuration() {
        let backoff = ErrorBackoff::default();

        assert_eq!(backoff.initial_interval, Duration::from_secs(5));
        assert_eq!(backoff.max_interval, Duration::from_secs(300));
        assert!((backoff.randomization_factor - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_out_of_range_randomization_factor_is_clamped() {
        let negative = ErrorBackoff::new(Duration::from_secs(5), Duration::from_secs(300), -0.5);
        let nan = ErrorBackoff::new(Duration::from_secs(5), Duration::from_secs(300), f64::NAN);
        let large = ErrorBackoff::new(Duration::from_secs(5), Duration::from_secs(300), 3.0);

        assert_eq!(negative.randomization_factor, 0.0);
        assert_eq!(nan.randomization_factor, 0.0);
        assert_eq!(large.randomization_factor, 1.0);
        assert_eq!(
            negative.next_delay(&key("a"), ErrorClass::Transient),
            Duration::from_secs(5)
        );
        assert_eq!(
            nan.next_delay(&key("a"), ErrorClass::Transient),
            Duration::from_secs(5)
        );
        assert!(large.next_delay(&key("a"), ErrorClass::Transient) <= Duration::from_secs(10));

        let mut bypassed = ErrorBackoff::default();
        bypassed.randomization_factor = -1.0;
        assert_eq!(
            bypassed.next_delay(&key("a"), ErrorClass::Transient),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_base_delay_doubles_until_cap() {
        let backoff = backoff();

        assert_eq!(backoff.base_delay(1), Duration::from_secs(5));
        assert_eq!(backoff.base_delay(2), Duration::from_secs(10));
        assert_eq!(backoff.base_delay(3), Duration::from_secs(20));
        assert_eq!(backoff.base_delay(7), Duration::from_secs(300));
        assert_eq!(backoff.base_delay(u32::MAX), Duration::from_secs(300));
    }

    #[test]
    fn test_transient_failures_grow_per_key() {
        let backoff = backoff();

        assert_eq!(
            backoff.next_delay(&key("a"), ErrorClass::Transient),
            Duration::from_secs(5)
        );
        assert_eq!(
            backoff.next_delay(&key("a"), ErrorClass::Transient),
            Duration::from_secs(10)
        );
        // Another key starts from the beginning.
        assert_eq!(
            backoff.next_delay(&key("b"), ErrorClass::Transient),
            Duration::from_secs(5)
        );
        assert_eq!(backoff.failures(&key("a")), 2);
    }

    #[test]
    fn test_permanent_failure_uses_cap() {
        let backoff = backoff();

        assert_eq!(
            backoff.next_delay(&key("a"), ErrorClass::Permanent),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_reset_clears_failures() {
        let backoff = backoff();
        backoff.next_delay(&key("a"), ErrorClass::Transient);
        backoff.next_delay(&key("a"), ErrorClass::Transient);

        backoff.reset(&key("a"));

        assert_eq!(backoff.failures(&key("a")), 0);
        assert_eq!(
            backoff.next_delay(&key("a"), ErrorClass::Transient),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let backoff = ErrorBackoff::new(Duration::from_secs(10), Duration::from_secs(300), 0.1);

        for _ in 0..100 {
            backoff.reset(&key("a"));
            let delay = backoff.next_delay(&key("a"), ErrorClass::Transient);
            assert!(delay >= Duration::from_secs(9), "{delay:?} below range");
            assert!(delay <= Duration::from_secs(11), "{delay:?} above range");
        }
    }

    #[test]
    fn test_jitter_never_exceeds_cap() {
        let backoff = ErrorBackoff::new(Duration::from_secs(300), Duration::from_secs(300), 0.1);

        for _ in 0..100 {
            let delay = backoff.next_delay(&key("a"), ErrorClass::Transient);
            assert!(delay <= Duration::from_secs(300));
        }
    }
}
