//! At most one outstanding request per view
//!
//! Starting a request aborts the previous one. Each request carries a
//! generation number; a result is only applied if its generation is still
//! the current one, so a response that raced past the abort is dropped.

use std::future::Future;

use futures::future::{AbortHandle, AbortRegistration, Abortable};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled<T> {
    Completed { generation: u64, value: T },
    Cancelled { generation: u64 },
}

impl<T> Settled<T> {
    pub fn generation(&self) -> u64 {
        match self {
            Settled::Completed { generation, .. } | Settled::Cancelled { generation } => {
                *generation
            }
        }
    }
}

#[derive(Debug)]
struct InFlight {
    generation: u64,
    label: String,
    abort: AbortHandle,
}

#[derive(Debug, Default)]
pub struct RequestLifecycle {
    generation: u64,
    in_flight: Option<InFlight>,
}

/// Permission to run one request; consumed by [`RequestTicket::run`]
#[derive(Debug)]
pub struct RequestTicket {
    generation: u64,
    registration: AbortRegistration,
}

impl RequestLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort whatever is running and hand out a ticket for a new request
    pub fn begin(&mut self, label: impl Into<String>) -> RequestTicket {
        self.cancel();
        self.generation += 1;

        let (abort, registration) = AbortHandle::new_pair();
        let label = label.into();
        debug!(generation = self.generation, %label, "Request started");
        self.in_flight = Some(InFlight {
            generation: self.generation,
            label,
            abort,
        });

        RequestTicket {
            generation: self.generation,
            registration,
        }
    }

    /// Abort the in-flight request, if any. Returns whether one was running.
    pub fn cancel(&mut self) -> bool {
        match self.in_flight.take() {
            Some(request) => {
                request.abort.abort();
                debug!(generation = request.generation, label = %request.label, "Request aborted");
                true
            }
            None => false,
        }
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|r| r.generation == generation)
    }

    /// Mark `generation` as finished. False means the result is stale.
    pub fn settle(&mut self, generation: u64) -> bool {
        if self.is_current(generation) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight_label(&self) -> Option<&str> {
        self.in_flight.as_ref().map(|r| r.label.as_str())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for RequestLifecycle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl RequestTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drive `future` until it finishes or the lifecycle aborts it.
    ///
    /// On abort the inner future is dropped, which cancels its transport.
    pub async fn run<F: Future>(self, future: F) -> Settled<F::Output> {
        match Abortable::new(future, self.registration).await {
            Ok(value) => Settled::Completed {
                generation: self.generation,
                value,
            },
            Err(_aborted) => Settled::Cancelled {
                generation: self.generation,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use futures::future::{self, FutureExt};

    #[test]
    fn test_begin_aborts_previous() {
        let mut lifecycle = RequestLifecycle::new();
        let (_tx, rx) = oneshot::channel::<u32>();

        let first = lifecycle.begin("length 4");
        let second = lifecycle.begin("length 5");
        assert_eq!(second.generation(), first.generation() + 1);

        let settled = block_on(first.run(rx));
        assert_eq!(settled, Settled::Cancelled { generation: 1 });
        assert!(!lifecycle.is_current(1));
        assert!(lifecycle.is_current(2));
        assert_eq!(lifecycle.in_flight_label(), Some("length 5"));
    }

    #[test]
    fn test_stale_result_is_not_settled() {
        let mut lifecycle = RequestLifecycle::new();
        let first = lifecycle.begin("a");
        // first already resolved before the second click
        let settled = block_on(first.run(future::ready(7)));
        let _second = lifecycle.begin("b");

        assert_eq!(
            settled,
            Settled::Completed {
                generation: 1,
                value: 7
            }
        );
        assert!(!lifecycle.settle(settled.generation()));
        assert!(lifecycle.is_busy());
    }

    #[test]
    fn test_settle_current_clears_in_flight() {
        let mut lifecycle = RequestLifecycle::new();
        let ticket = lifecycle.begin("a");
        let settled = block_on(ticket.run(future::ready(())));
        assert!(lifecycle.settle(settled.generation()));
        assert!(!lifecycle.is_busy());
        assert!(!lifecycle.cancel());
    }

    #[test]
    fn test_cancel_drops_inner_future() {
        let mut lifecycle = RequestLifecycle::new();
        let ticket = lifecycle.begin("a");
        let (tx, rx) = oneshot::channel::<()>();
        let guarded = rx.map(|_| ());

        lifecycle.cancel();
        let settled = block_on(ticket.run(guarded));
        assert!(matches!(settled, Settled::Cancelled { .. }));
        // receiver dropped with the aborted future
        assert!(tx.is_canceled());
    }
}
