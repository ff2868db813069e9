use crate::error::LocationError;
use crate::geo::GeoPoint;
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Device location source. May block; callers run it off the UI thread.
pub trait LocationProvider: Send + Sync {
    fn locate(&self) -> Result<GeoPoint, LocationError>;
}

/// Every way a location request can end. Denial and timeout are values,
/// not dialogs.
#[derive(Clone, Debug, PartialEq)]
pub enum LocationOutcome {
    Located(GeoPoint),
    Denied,
    Unavailable(String),
    TimedOut,
}

/// A fix being worked on off the UI thread
pub struct LocationRequest {
    rx: mpsc::Receiver<Result<GeoPoint, LocationError>>,
    deadline: Instant,
}

/// Ask `provider` for a fix, giving up after `timeout`. Returns at once;
/// poll the request from the event loop.
pub fn request_location(provider: Arc<dyn LocationProvider>, timeout: Duration) -> LocationRequest {
    let (tx, rx) = mpsc::channel();
    rayon::spawn(move || {
        // Receiver may be gone after a timeout
        let _ = tx.send(provider.locate());
    });
    LocationRequest {
        rx,
        deadline: Instant::now() + timeout,
    }
}

impl LocationRequest {
    /// `None` while the provider is still working and the deadline has not passed
    pub fn poll(&self, now: Instant) -> Option<LocationOutcome> {
        let outcome = match self.rx.try_recv() {
            Ok(Ok(point)) => LocationOutcome::Located(point),
            Ok(Err(LocationError::Denied)) => LocationOutcome::Denied,
            Ok(Err(LocationError::Unavailable(reason))) => LocationOutcome::Unavailable(reason),
            Err(TryRecvError::Disconnected) => LocationOutcome::Unavailable("location provider stopped".to_string()),
            Err(TryRecvError::Empty) if now >= self.deadline => LocationOutcome::TimedOut,
            Err(TryRecvError::Empty) => return None,
        };
        debug!(?outcome, "location request finished");
        Some(outcome)
    }
}

/// Provider backed by a configured home position; denies when unset
pub struct FixedLocation {
    home: Option<GeoPoint>,
}

impl FixedLocation {
    pub fn new(home: Option<GeoPoint>) -> Self {
        Self { home }
    }
}

impl LocationProvider for FixedLocation {
    fn locate(&self) -> Result<GeoPoint, LocationError> {
        match self.home {
            Some(point) if point.is_finite() => Ok(point),
            Some(_) => Err(LocationError::Unavailable("configured position is not finite".to_string())),
            None => Err(LocationError::Denied),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stalled;

    impl LocationProvider for Stalled {
        fn locate(&self) -> Result<GeoPoint, LocationError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(GeoPoint::new(0.0, 0.0))
        }
    }

    fn finish(request: LocationRequest) -> LocationOutcome {
        let give_up = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(outcome) = request.poll(Instant::now()) {
                return outcome;
            }
            assert!(Instant::now() < give_up, "location request never finished");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_located() {
        let provider = Arc::new(FixedLocation::new(Some(GeoPoint::new(38.03, -78.48))));
        assert_eq!(
            finish(request_location(provider, Duration::from_secs(5))),
            LocationOutcome::Located(GeoPoint::new(38.03, -78.48))
        );
    }

    #[test]
    fn test_denied_without_home() {
        let provider = Arc::new(FixedLocation::new(None));
        assert_eq!(finish(request_location(provider, Duration::from_secs(5))), LocationOutcome::Denied);
    }

    #[test]
    fn test_pending_then_times_out() {
        let request = request_location(Arc::new(Stalled), Duration::from_millis(200));
        assert_eq!(request.poll(Instant::now()), None);
        assert_eq!(finish(request), LocationOutcome::TimedOut);
    }
}
