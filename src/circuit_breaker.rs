use failsafe::{backoff, failure_policy, Config};
use std::future::Future;
use std::time::Duration;

use crate::errors::SourceError;
use crate::models::SourceKind;

/// Breaker type shared by every source adapter.
pub type SourceCircuitBreaker = failsafe::StateMachine<
    failure_policy::ConsecutiveFailures<backoff::Exponential>,
    (),
>;

/// Creates a circuit breaker for one upstream source to prevent hammering a vendor that is down.
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive transport failures triggers OPEN state.
/// - **Backoff**: Exponential backoff from 10s to 60s before attempting recovery.
///
/// Business errors and 404s are answers, not outages, and never count as failures.
pub fn create_source_circuit_breaker() -> SourceCircuitBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

/// Runs `call` through the breaker. A rejected call surfaces as a transport error.
pub async fn guarded<T, F>(
    breaker: &SourceCircuitBreaker,
    vendor: SourceKind,
    call: F,
) -> Result<T, SourceError>
where
    F: Future<Output = Result<T, SourceError>>,
{
    use failsafe::futures::CircuitBreaker;

    match breaker
        .call_with(|e: &SourceError| e.is_transport(), call)
        .await
    {
        Ok(value) => Ok(value),
        Err(failsafe::Error::Inner(e)) => Err(e),
        Err(failsafe::Error::Rejected) => {
            tracing::warn!("Circuit open for {}, rejecting call", vendor);
            Err(SourceError::transport(vendor, "circuit open"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outage() -> SourceError {
        SourceError::transport(SourceKind::Registry, "simulated outage")
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_after_transport_failures() {
        let cb = create_source_circuit_breaker();

        // Simulate 5 consecutive failures
        for _ in 0..5 {
            let result: Result<(), SourceError> =
                guarded(&cb, SourceKind::Registry, async { Err(outage()) }).await;
            assert!(result.is_err());
        }

        // Next call should be rejected without running
        let result = guarded(&cb, SourceKind::Registry, async { Ok::<_, SourceError>(1) }).await;
        match result {
            Err(SourceError::Transport { message, .. }) => assert_eq!(message, "circuit open"),
            other => panic!("Expected circuit to be open, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_business_errors_do_not_trip_breaker() {
        let cb = create_source_circuit_breaker();

        for _ in 0..10 {
            let result: Result<(), SourceError> = guarded(&cb, SourceKind::Regulator, async {
                Err(SourceError::business(SourceKind::Regulator, "bad FRN"))
            })
            .await;
            assert!(matches!(result, Err(SourceError::Business { .. })));
        }

        let result = guarded(&cb, SourceKind::Regulator, async { Ok::<_, SourceError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_circuit_breaker_allows_success() {
        let cb = create_source_circuit_breaker();

        let result = guarded(&cb, SourceKind::BusinessData, async { Ok::<_, SourceError>(42) }).await;

        assert_eq!(result.unwrap(), 42);
    }
}
