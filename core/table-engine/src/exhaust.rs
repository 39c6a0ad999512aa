//! FILENAME: core/table-engine/src/exhaust.rs
//! PURPOSE: The exhaust-latest operator.
//! CONTEXT: Runs one asynchronous projection per upstream value, never two at
//! once. Values arriving while a projection is in flight are parked in a
//! single slot, each one replacing the previous, and the parked value is
//! projected as soon as the running one finishes. Intermediate values are
//! dropped; the last one never is.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

/// Drive `upstream` through `project`, handing every projection result to
/// `sink` in the order the projections were started.
///
/// Returns `Ok(())` once the upstream channel is closed and the in-flight and
/// parked work has finished. The first upstream error or projection error is
/// returned immediately; any running projection is dropped with it.
pub async fn exhaust_latest<T, R, E, F, Fut, S>(
    mut upstream: mpsc::UnboundedReceiver<Result<T, E>>,
    mut project: F,
    mut sink: S,
) -> Result<(), E>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    S: FnMut(R),
{
    let mut parked: Option<T> = None;
    let mut in_flight: Option<Pin<Box<Fut>>> = None;
    let mut open = true;

    loop {
        if in_flight.is_none() {
            match parked.take() {
                Some(value) => in_flight = Some(Box::pin(project(value))),
                None if !open => return Ok(()),
                None => {}
            }
        }

        tokio::select! {
            biased;

            message = upstream.recv(), if open => match message {
                Some(Ok(value)) => {
                    if in_flight.is_none() {
                        in_flight = Some(Box::pin(project(value)));
                    } else {
                        parked = Some(value);
                    }
                }
                Some(Err(e)) => return Err(e),
                None => open = false,
            },

            result = poll_slot(&mut in_flight) => {
                in_flight = None;
                sink(result?);
            }
        }
    }
}

/// Await the future in `slot`, or stay pending forever if there is none.
async fn poll_slot<Fut: Future>(slot: &mut Option<Pin<Box<Fut>>>) -> Fut::Output {
    match slot {
        Some(fut) => fut.as_mut().await,
        None => std::future::pending().await,
    }
}
