use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::instrument::InstrumentCode;

/// Controls the out-of-process ingestion job feeding the store.
pub trait Supervisor {
    /// Stop any running job and start a fresh one against `instrument`.
    fn restart(&mut self, instrument: &InstrumentCode) -> AppResult<()>;
    fn stop(&mut self) -> AppResult<()>;
}

/// For sessions where ingestion is run and managed separately.
#[derive(Debug, Default)]
pub struct DetachedSupervisor;

impl Supervisor for DetachedSupervisor {
    fn restart(&mut self, instrument: &InstrumentCode) -> AppResult<()> {
        info!(instrument = %instrument, "Ingestion is detached; restart it manually");
        Ok(())
    }

    fn stop(&mut self) -> AppResult<()> {
        Ok(())
    }
}

/// Launches the ingestion binary as a child process, one per instrument.
#[derive(Debug)]
pub struct ChildProcessSupervisor {
    program: PathBuf,
    child: Option<Child>,
}

impl ChildProcessSupervisor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            child: None,
        }
    }

    /// The `tickflow-ingest` binary installed next to the running executable.
    pub fn sibling_ingest_binary() -> AppResult<Self> {
        let exe = std::env::current_exe()?;
        let dir = exe
            .parent()
            .ok_or_else(|| AppError::Supervisor("executable has no parent directory".into()))?;
        let name = if cfg!(windows) {
            "tickflow-ingest.exe"
        } else {
            "tickflow-ingest"
        };
        Ok(Self::new(dir.join(name)))
    }
}

impl Supervisor for ChildProcessSupervisor {
    fn restart(&mut self, instrument: &InstrumentCode) -> AppResult<()> {
        self.stop()?;
        let child = Command::new(&self.program)
            .arg("--instrument")
            .arg(instrument.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                AppError::Supervisor(format!("failed to launch {}: {}", self.program.display(), e))
            })?;
        info!(
            pid = child.id(),
            instrument = %instrument,
            program = %self.program.display(),
            "Ingestion job started"
        );
        self.child = Some(child);
        Ok(())
    }

    /// Kill the job and return without waiting for it to exit. Callers run on the
    /// async session task, so the child is reaped on its own thread.
    fn stop(&mut self) -> AppResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let pid = child.id();
        if let Err(e) = child.kill() {
            // Already exited on its own.
            warn!(pid, error = %e, "Ingestion job kill failed");
        }
        std::thread::Builder::new()
            .name(format!("reap-ingest-{}", pid))
            .spawn(move || match child.wait() {
                Ok(status) => info!(pid, status = %status, "Ingestion job stopped"),
                Err(e) => warn!(pid, error = %e, "Failed to reap ingestion job"),
            })?;
        Ok(())
    }
}

impl Drop for ChildProcessSupervisor {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "Failed to stop ingestion job on drop");
        }
    }
}

impl<S: Supervisor + ?Sized> Supervisor for Box<S> {
    fn restart(&mut self, instrument: &InstrumentCode) -> AppResult<()> {
        (**self).restart(instrument)
    }

    fn stop(&mut self) -> AppResult<()> {
        (**self).stop()
    }
}
