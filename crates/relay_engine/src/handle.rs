use std::io;
use std::thread;

use relay_core::ItemId;
use relay_logging::relay_error;
use tokio::sync::mpsc;

use crate::scheduler::{PollingScheduler, RelayCommand};

/// Runs a [`PollingScheduler`] on its own thread and runtime.
pub struct RelayHandle {
    cmd_tx: mpsc::UnboundedSender<RelayCommand>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RelayHandle {
    pub fn spawn(scheduler: PollingScheduler) -> io::Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;

        let thread = thread::Builder::new()
            .name(format!("relay-{}", scheduler.source_id()))
            .spawn(move || runtime.block_on(scheduler.run(cmd_rx)))?;

        Ok(Self {
            cmd_tx,
            thread: Some(thread),
        })
    }

    pub fn inject(&self, id: impl Into<ItemId>) {
        let _ = self.cmd_tx.send(RelayCommand::Inject(id.into()));
    }

    pub fn poll_now(&self) {
        let _ = self.cmd_tx.send(RelayCommand::PollNow);
    }

    /// Stop the loop after its current iteration and wait for the thread.
    pub fn shutdown(mut self) {
        let _ = self.cmd_tx.send(RelayCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                relay_error!("Relay thread panicked");
            }
        }
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(RelayCommand::Shutdown);
    }
}
