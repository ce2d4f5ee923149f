//! Reactor running on its own named thread.

use std::thread::{self, JoinHandle};

use crate::error::{ReactorError, Result};
use crate::reactor::{Reactor, ReactorConfig, ReactorHandle};

/// Owns a thread running [`Reactor::run`]. Stops and joins on drop.
pub struct ReactorThread {
    handle: ReactorHandle,
    join: Option<JoinHandle<Result<()>>>,
}

impl ReactorThread {
    pub fn spawn(name: &str) -> Result<Self> {
        Self::spawn_with_config(name, ReactorConfig::default())
    }

    pub fn spawn_with_config(name: &str, config: ReactorConfig) -> Result<Self> {
        let mut reactor = Reactor::with_config(config)?;
        let handle = reactor.handle();
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || reactor.run())?;
        Ok(Self {
            handle,
            join: Some(join),
        })
    }

    pub fn handle(&self) -> &ReactorHandle {
        &self.handle
    }

    /// Stop the loop and wait for the thread. Queued tasks run first.
    pub fn stop_and_join(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(join) = self.join.take() else {
            return Ok(());
        };
        self.handle.stop();
        join.join().map_err(|_| ReactorError::Panicked)?
    }
}

impl Drop for ReactorThread {
    fn drop(&mut self) {
        if let Err(_e) = self.shutdown() {
            trace_warn!(error = %_e, "reactor thread exited with error");
        }
    }
}
