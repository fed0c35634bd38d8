//! Helpers shared by the unit tests.

use std::future::Future;
use std::task::{Context, Poll, Waker};

/// Drive a future to completion on the current thread.
///
/// Only suitable for futures that make progress on every poll; a future
/// that waits on an external event spins forever.
pub fn block_on<F: Future>(f: F) -> F::Output {
    let mut cx = Context::from_waker(Waker::noop());
    let mut f = std::pin::pin!(f);

    loop {
        if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
            return result;
        }
    }
}

/// Poll a pinned future once.
pub fn poll_once<F: Future + ?Sized>(f: std::pin::Pin<&mut F>) -> Poll<F::Output> {
    let mut cx = Context::from_waker(Waker::noop());
    f.poll(&mut cx)
}
