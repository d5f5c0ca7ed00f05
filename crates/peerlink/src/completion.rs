//! Single-resolution completions for asynchronous calls
//!
//! An asynchronous managed call receives a `bridge/kt/Completion` object
//! holding a retained handle to a [`CompletionEntry`]. The managed side
//! resumes it once from whatever thread finishes the work; the native
//! caller waits on the paired [`Completion`], blocking or as a `Future`.
//!
//! Resolution is claimed with an atomic exchange, so a second resume is
//! rejected with [`BridgeError::AlreadyCompleted`] without touching the
//! delivered result. If the entry is dropped unresolved (the managed
//! callback was collected), the caller sees [`BridgeError::CompletionDropped`].

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::bridge::Bridge;
use crate::classes;
use crate::convert::{element_from_managed, Bridgeable};
use crate::error::{BridgeError, BridgeResult};
use crate::handle::NativeObject;
use crate::options::MarshalOptions;
use crate::refs::LocalRef;
use crate::value::{ManagedValue, ObjRef};

struct State<T> {
    result: Option<BridgeResult<T>>,
    done: bool,
    waker: Option<Waker>,
}

struct Shared<T> {
    claimed: AtomicBool,
    state: Mutex<State<T>>,
    ready: Condvar,
}

impl<T> Shared<T> {
    fn deliver(&self, result: BridgeResult<T>) {
        let waker = {
            let mut state = self.state.lock();
            state.result = Some(result);
            state.done = true;
            state.waker.take()
        };
        self.ready.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Receiving side of an asynchronous result
pub struct Completion<T> {
    shared: Arc<Shared<T>>,
}

/// Resolving side of an asynchronous result
pub struct Resolver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Completion<T> {
    /// A connected completion and resolver
    pub fn pair() -> (Completion<T>, Resolver<T>) {
        let shared = Arc::new(Shared {
            claimed: AtomicBool::new(false),
            state: Mutex::new(State {
                result: None,
                done: false,
                waker: None,
            }),
            ready: Condvar::new(),
        });
        (
            Completion {
                shared: shared.clone(),
            },
            Resolver { shared },
        )
    }

    /// Whether a result has been delivered
    pub fn is_complete(&self) -> bool {
        self.shared.state.lock().done
    }

    /// Block until resolved
    pub fn wait(self) -> BridgeResult<T> {
        let mut state = self.shared.state.lock();
        while !state.done {
            self.shared.ready.wait(&mut state);
        }
        state
            .result
            .take()
            .unwrap_or(Err(BridgeError::AlreadyCompleted))
    }

    /// Block until resolved or `timeout` elapses. `None` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<BridgeResult<T>> {
        let mut state = self.shared.state.lock();
        if !state.done {
            self.shared.ready.wait_while_for(&mut state, |s| !s.done, timeout);
        }
        if state.done {
            state.result.take()
        } else {
            None
        }
    }
}

impl<T> Future for Completion<T> {
    type Output = BridgeResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock();
        if state.done {
            Poll::Ready(
                state
                    .result
                    .take()
                    .unwrap_or(Err(BridgeError::AlreadyCompleted)),
            )
        } else {
            state.waker = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}

impl<T> Resolver<T> {
    /// Deliver the result. Fails with `AlreadyCompleted` after the first call.
    pub fn resolve(&self, result: BridgeResult<T>) -> BridgeResult<()> {
        if self.shared.claimed.swap(true, Ordering::AcqRel) {
            tracing::warn!("completion resolved twice");
            return Err(BridgeError::AlreadyCompleted);
        }
        self.shared.deliver(result);
        Ok(())
    }

    /// Whether a result has been claimed
    pub fn is_resolved(&self) -> bool {
        self.shared.claimed.load(Ordering::Acquire)
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if !self.shared.claimed.swap(true, Ordering::AcqRel) {
            tracing::debug!("completion dropped unresolved");
            self.shared.deliver(Err(BridgeError::CompletionDropped));
        }
    }
}

// ============================================================================
// Managed callback
// ============================================================================

pub(crate) trait CompletionSink: Send + Sync {
    fn resume(&self, bridge: &Bridge, value: Option<ObjRef>, throwable: Option<ObjRef>) -> BridgeResult<()>;
}

struct TypedSink<T> {
    resolver: Resolver<T>,
    options: MarshalOptions,
}

impl<T: Bridgeable + Send + 'static> CompletionSink for TypedSink<T> {
    fn resume(&self, bridge: &Bridge, value: Option<ObjRef>, throwable: Option<ObjRef>) -> BridgeResult<()> {
        if self.resolver.is_resolved() {
            return Err(BridgeError::AlreadyCompleted);
        }
        let result = match throwable {
            Some(throwable) => {
                let throwable = bridge.local(bridge.env().new_local_ref(throwable)?);
                Err(BridgeError::Thrown(bridge.thrown_from(&throwable)?))
            }
            None => element_from_managed::<T>(bridge, value, self.options),
        };
        self.resolver.resolve(result)
    }
}

/// Native object behind a managed `Completion` callback
pub struct CompletionEntry(Box<dyn CompletionSink>);

impl CompletionEntry {
    pub(crate) fn resume(&self, bridge: &Bridge, value: Option<ObjRef>, throwable: Option<ObjRef>) -> BridgeResult<()> {
        self.0.resume(bridge, value, throwable)
    }
}

impl Bridge {
    /// A completion and the managed callback object that resolves it
    pub fn completion_callback<R>(&self, options: MarshalOptions) -> BridgeResult<(Completion<R>, LocalRef<'_>)>
    where
        R: Bridgeable + Send + 'static,
    {
        let (completion, resolver) = Completion::pair();
        let entry: NativeObject = Arc::new(CompletionEntry(Box::new(TypedSink { resolver, options })));
        let handle = self.handles().handle_for(Some(&entry), true);
        drop(entry);

        match self.new_object_raw(classes::COMPLETION, classes::PEER_CTOR, &[ManagedValue::long(handle.as_long())]) {
            Ok(callback) => Ok((completion, callback)),
            Err(e) => {
                self.handles().release_abandoned(handle);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::task::Wake;
    use std::thread::Thread;

    struct ThreadWaker(Thread);

    impl Wake for ThreadWaker {
        fn wake(self: Arc<Self>) {
            self.0.unpark();
        }
    }

    fn block_on<F: Future>(fut: F) -> F::Output {
        let mut fut = Box::pin(fut);
        let waker = Waker::from(Arc::new(ThreadWaker(std::thread::current())));
        let mut cx = Context::from_waker(&waker);
        loop {
            match fut.as_mut().poll(&mut cx) {
                Poll::Ready(out) => return out,
                Poll::Pending => std::thread::park(),
            }
        }
    }

    #[test]
    fn test_resolves_exactly_once() {
        let (completion, resolver) = Completion::<i32>::pair();
        resolver.resolve(Ok(42)).unwrap();
        assert!(matches!(resolver.resolve(Ok(7)), Err(BridgeError::AlreadyCompleted)));
        assert_eq!(completion.wait().unwrap(), 42);
    }

    #[test]
    fn test_dropped_resolver() {
        let (completion, resolver) = Completion::<i32>::pair();
        drop(resolver);
        assert!(matches!(completion.wait(), Err(BridgeError::CompletionDropped)));
    }

    #[test]
    fn test_resolved_then_dropped_keeps_result() {
        let (completion, resolver) = Completion::<&str>::pair();
        resolver.resolve(Ok("done")).unwrap();
        drop(resolver);
        assert_eq!(completion.wait().unwrap(), "done");
    }

    #[test]
    fn test_wait_timeout() {
        let (completion, resolver) = Completion::<u8>::pair();
        assert!(completion.wait_timeout(Duration::from_millis(10)).is_none());
        resolver.resolve(Ok(1)).unwrap();
        assert_eq!(completion.wait_timeout(Duration::from_millis(10)).unwrap().unwrap(), 1);
    }

    #[test]
    fn test_racing_resolvers_single_winner() {
        let (completion, resolver) = Completion::<usize>::pair();
        let resolver = Arc::new(resolver);
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let resolver = resolver.clone();
                std::thread::spawn(move || resolver.resolve(Ok(i)).is_ok())
            })
            .collect();
        let winners = threads.into_iter().map(|t| t.join().unwrap()).filter(|w| *w).count();
        assert_eq!(winners, 1);
        assert!(completion.wait().unwrap() < 8);
    }

    #[test]
    fn test_future_across_threads() {
        let (completion, resolver) = Completion::<String>::pair();
        let worker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            resolver.resolve(Ok("late".to_string())).unwrap();
        });
        assert_eq!(block_on(completion).unwrap(), "late");
        worker.join().unwrap();
    }
}
