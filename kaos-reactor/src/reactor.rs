//! Poll loop, task queue and the cross-thread handle.

use std::io;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use mio::{Events, Poll, Token, Waker};
use parking_lot::Mutex;

use crate::channel::{Channel, Channels, Dispatch, Ready};
use crate::error::{ReactorError, Result};

const WAKER: Token = Token(0);

/// Work queued onto the reactor thread.
pub type Task = Box<dyn FnOnce(&mut Channels) + Send>;

#[derive(Debug, Clone)]
pub struct ReactorConfig {
    /// Readiness events collected per poll call.
    pub event_capacity: usize,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            event_capacity: 1024,
        }
    }
}

impl ReactorConfig {
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

struct Shared {
    waker: Waker,
    tasks: Sender<Task>,
    stop_requested: AtomicBool,
    stopped: AtomicBool,
    next_token: AtomicUsize,
    loop_thread: Mutex<Option<ThreadId>>,
}

/// Cloneable, thread-safe entry point into a [`Reactor`].
#[derive(Clone)]
pub struct ReactorHandle {
    shared: Arc<Shared>,
}

impl ReactorHandle {
    /// Queue `task` to run on the reactor thread.
    ///
    /// Tasks run in submission order, after the readiness callbacks of the
    /// current turn. Fails with [`ReactorError::Stopped`] once the loop has
    /// exited; in that case the task is dropped without running.
    pub fn run_in_loop<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce(&mut Channels) + Send + 'static,
    {
        if self.shared.stopped.load(Ordering::Acquire) {
            return Err(ReactorError::Stopped);
        }
        self.shared
            .tasks
            .send(Box::new(task))
            .map_err(|_| ReactorError::Stopped)?;
        self.shared.waker.wake()?;
        Ok(())
    }

    /// Allocate a registration handle for `fd`. Attach it from a task.
    pub fn channel(&self, fd: RawFd) -> Channel {
        let token = self.shared.next_token.fetch_add(1, Ordering::Relaxed);
        Channel::new(Token(token), fd)
    }

    /// Ask the loop to exit after the current turn.
    pub fn stop(&self) {
        self.shared.stop_requested.store(true, Ordering::Release);
        if let Err(_e) = self.shared.waker.wake() {
            trace_warn!(error = %_e, "reactor wake failed");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// True when called from the thread currently running the loop.
    pub fn in_loop_thread(&self) -> bool {
        *self.shared.loop_thread.lock() == Some(thread::current().id())
    }
}

impl std::fmt::Debug for ReactorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactorHandle")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Readiness reactor. Drive it with [`Reactor::run`] on a dedicated thread,
/// or step it with [`Reactor::turn`].
pub struct Reactor {
    poll: Poll,
    events: Events,
    channels: Channels,
    tasks: Receiver<Task>,
    shared: Arc<Shared>,
    /// Channels that asked to be dispatched again.
    rearmed: Vec<(Token, Ready)>,
}

impl Reactor {
    pub fn new() -> Result<Self> {
        Self::with_config(ReactorConfig::default())
    }

    pub fn with_config(config: ReactorConfig) -> Result<Self> {
        let poll = Poll::new()?;
        let waker = Waker::new(poll.registry(), WAKER)?;
        let registry = poll.registry().try_clone()?;
        let (tx, rx) = crossbeam_channel::unbounded();

        let shared = Arc::new(Shared {
            waker,
            tasks: tx,
            stop_requested: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            next_token: AtomicUsize::new(1),
            loop_thread: Mutex::new(None),
        });

        Ok(Self {
            poll,
            events: Events::with_capacity(config.event_capacity.max(1)),
            channels: Channels::new(registry),
            tasks: rx,
            shared,
            rearmed: Vec::new(),
        })
    }

    pub fn handle(&self) -> ReactorHandle {
        ReactorHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run until [`ReactorHandle::stop`] is called.
    ///
    /// Tasks still queued when the stop is observed run before this returns,
    /// so teardown commands submitted ahead of the stop are not lost.
    pub fn run(&mut self) -> Result<()> {
        *self.shared.loop_thread.lock() = Some(thread::current().id());
        trace_debug!("reactor loop started");

        let result = loop {
            if self.shared.stop_requested.load(Ordering::Acquire) {
                break Ok(());
            }
            if let Err(e) = self.turn(None) {
                break Err(e);
            }
        };

        self.shared.stopped.store(true, Ordering::Release);
        self.drain_tasks();
        *self.shared.loop_thread.lock() = None;
        trace_debug!("reactor loop stopped");
        result
    }

    /// One loop iteration: poll, dispatch readiness, then drain tasks.
    ///
    /// Returns the number of handlers dispatched. Polls without blocking when
    /// a handler asked to be dispatched again.
    pub fn turn(&mut self, timeout: Option<Duration>) -> Result<usize> {
        let timeout = if self.rearmed.is_empty() {
            timeout
        } else {
            Some(Duration::ZERO)
        };

        loop {
            match self.poll.poll(&mut self.events, timeout) {
                Ok(()) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let mut pending = std::mem::take(&mut self.rearmed);
        for event in self.events.iter() {
            if event.token() == WAKER {
                continue;
            }
            let ready = Ready::from_event(event);
            match pending.iter_mut().find(|(token, _)| *token == event.token()) {
                Some((_, merged)) => *merged = *merged | ready,
                None => pending.push((event.token(), ready)),
            }
        }

        let mut dispatched = 0;
        for (token, ready) in pending.drain(..) {
            if let Some(outcome) = self.channels.dispatch(token, ready) {
                dispatched += 1;
                if outcome == Dispatch::Again {
                    self.rearmed.push((token, Ready::READABLE));
                }
            }
        }

        self.drain_tasks();
        Ok(dispatched)
    }

    pub fn channels(&self) -> &Channels {
        &self.channels
    }

    fn drain_tasks(&mut self) {
        loop {
            match self.tasks.try_recv() {
                Ok(task) => task(&mut self.channels),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        self.shared.stopped.store(true, Ordering::Release);
        // Queued tasks may own resources whose teardown must still happen.
        self.drain_tasks();
    }
}
