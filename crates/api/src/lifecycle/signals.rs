//! Shutdown trigger sources.
//!
//! # Responsibilities
//! - Register SIGTERM/SIGINT handlers (Ctrl-C elsewhere)
//! - Route panics to the controller through a chained panic hook
//! - Watch supervised background tasks for errors and panics
//!
//! Every source feeds one channel. Repeated signals are delivered too; the
//! controller ignores everything after the first.

use std::io;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::ShutdownTrigger;

/// Fires triggers into a [`Triggers`] channel from anywhere.
#[derive(Debug, Clone)]
pub struct TriggerSender(mpsc::UnboundedSender<ShutdownTrigger>);

impl TriggerSender {
    pub fn fire(&self, trigger: ShutdownTrigger) {
        // The receiver only goes away with the process.
        let _ = self.0.send(trigger);
    }
}

/// Receiving end of every shutdown trigger source.
///
/// Dropping it stops the signal listeners and supervisors. If the fault hook
/// was installed it is replaced by the default panic hook; any hook that was
/// chained behind it is discarded.
#[derive(Debug)]
pub struct Triggers {
    tx: mpsc::UnboundedSender<ShutdownTrigger>,
    rx: mpsc::UnboundedReceiver<ShutdownTrigger>,
    tasks: Vec<JoinHandle<()>>,
    hook_installed: bool,
}

impl Default for Triggers {
    fn default() -> Self {
        Self::new()
    }
}

impl Triggers {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            tasks: Vec::new(),
            hook_installed: false,
        }
    }

    pub fn sender(&self) -> TriggerSender {
        TriggerSender(self.tx.clone())
    }

    /// Forward every SIGTERM and SIGINT.
    ///
    /// # Errors
    ///
    /// Fails if the OS refuses a signal registration.
    #[cfg(unix)]
    pub fn install_signals(&mut self) -> io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        for (kind, trigger) in [
            (SignalKind::terminate(), ShutdownTrigger::Terminate),
            (SignalKind::interrupt(), ShutdownTrigger::Interrupt),
        ] {
            let mut stream = signal(kind)?;
            let sender = self.sender();
            self.tasks.push(tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    sender.fire(trigger.clone());
                }
            }));
        }
        Ok(())
    }

    /// Forward every Ctrl-C.
    #[cfg(not(unix))]
    pub fn install_signals(&mut self) -> io::Result<()> {
        let sender = self.sender();
        self.tasks.push(tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                sender.fire(ShutdownTrigger::Interrupt);
            }
        }));
        Ok(())
    }

    /// Chain a panic hook that reports every panic as
    /// [`ShutdownTrigger::UncaughtFault`]. The previous hook still runs first.
    pub fn install_fault_hook(&mut self) {
        let sender = self.sender();
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            previous(info);
            sender.fire(ShutdownTrigger::UncaughtFault(info.to_string()));
        }));
        self.hook_installed = true;
    }

    /// Watch `task`: an `Err` result or a panic becomes
    /// [`ShutdownTrigger::UnhandledAsyncFault`]. Clean completion and
    /// cancellation do not.
    pub fn supervise(&mut self, name: &'static str, task: JoinHandle<anyhow::Result<()>>) {
        let sender = self.sender();
        self.tasks.push(tokio::spawn(async move {
            let fault = match task.await {
                Ok(Ok(())) => return,
                Ok(Err(err)) => format!("{name}: {err:#}"),
                Err(join) if join.is_panic() => format!("{name} panicked"),
                Err(_) => return,
            };
            sender.fire(ShutdownTrigger::UnhandledAsyncFault(fault));
        }));
    }

    /// Wait for the next trigger.
    pub async fn next(&mut self) -> ShutdownTrigger {
        match self.rx.recv().await {
            Some(trigger) => trigger,
            // `self.tx` keeps the channel open, so this never resolves.
            None => std::future::pending().await,
        }
    }
}

impl Drop for Triggers {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        if self.hook_installed && !std::thread::panicking() {
            drop(std::panic::take_hook());
        }
    }
}
