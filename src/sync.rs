use core::{
    future::{poll_fn, Future},
    task::Poll,
};

use portable_atomic::{AtomicU32, AtomicUsize, Ordering};

use atomic_waker::AtomicWaker;

use crate::{WlanError, WlanResult};

/// Identifies a request, so that the reply to an abandoned request isn't taken for a later one.
pub(crate) type RequestId = u16;

/// Carries the result of a request from the worker back to the caller.
///
/// The state packs the id of the request into the upper bits and the result code into the lowest
/// byte.
pub(crate) struct ReplySignal {
    state: AtomicU32,
    waker: AtomicWaker,
}
impl ReplySignal {
    const PENDING: u8 = 0;
    const DONE: u8 = 0xff;
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(Self::PENDING as u32),
            waker: AtomicWaker::new(),
        }
    }
    pub fn signal(&self, id: RequestId, result: WlanResult<()>) {
        let code = match result {
            Ok(()) => Self::DONE,
            Err(err) => err.into_code(),
        };
        self.state
            .store(((id as u32) << 8) | code as u32, Ordering::Release);
        self.waker.wake();
    }
    /// Wait for the reply to the request `id`. Replies to other requests are skipped.
    pub fn wait(&self, id: RequestId) -> impl Future<Output = WlanResult<()>> + use<'_> {
        poll_fn(move |cx| {
            self.waker.register(cx.waker());
            let state = self.state.load(Ordering::Acquire);
            let code = state as u8;
            if code == Self::PENDING || (state >> 8) as RequestId != id {
                return Poll::Pending;
            }
            Poll::Ready(match code {
                Self::DONE => Ok(()),
                code => Err(WlanError::from_code(code)),
            })
        })
    }
}

/// Counts queued station requests, which preempt a connection attempt in progress.
///
/// Unlike a queue of signals, waiting on this doesn't consume anything. The count is only
/// decremented, once the worker dequeued the request.
pub(crate) struct PendingRequests {
    waker: AtomicWaker,
    pending: AtomicUsize,
}
impl PendingRequests {
    pub const fn new() -> Self {
        Self {
            waker: AtomicWaker::new(),
            pending: AtomicUsize::new(0),
        }
    }
    /// Increments the pending requests by one.
    pub fn put(&self) {
        self.pending.fetch_add(1, Ordering::Release);
        self.waker.wake();
    }
    /// Decrements the pending requests by one, if there are any.
    pub fn take(&self) {
        let _ = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pending| {
                pending.checked_sub(1)
            });
    }
    /// Reset the amount of pending requests back to zero.
    pub fn reset(&self) {
        self.pending.store(0, Ordering::Relaxed);
    }
    /// Asynchronously wait until at least one request is pending.
    pub async fn preempted(&self) {
        poll_fn(|cx| {
            self.waker.register(cx.waker());
            if self.pending.load(Ordering::Acquire) == 0 {
                Poll::Pending
            } else {
                Poll::Ready(())
            }
        })
        .await
    }
}
