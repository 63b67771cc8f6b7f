//! Workers as OS processes.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use crate::supervisor::{WorkerExit, WorkerLauncher, WorkerProcess};

/// Environment variable carrying the slot number into a worker.
pub const WORKER_SLOT_ENV: &str = "LOLGATE_WORKER_SLOT";

/// Launches workers by re-running a program, normally the current binary.
#[derive(Clone, Debug)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<OsString>,
    pass_slot: bool,
}

impl ProcessLauncher {
    /// Launches `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            pass_slot: true,
        }
    }

    /// Launches the running executable again.
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    /// Appends an argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Stops appending `--slot N` to the arguments. The slot is still
    /// exported through the environment.
    pub fn without_slot_arg(mut self) -> Self {
        self.pass_slot = false;
        self
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&self, slot: usize) -> std::io::Result<Box<dyn WorkerProcess>> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env(WORKER_SLOT_ENV, slot.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if self.pass_slot {
            command.arg("--slot").arg(slot.to_string());
        }

        let child = command.spawn()?;
        Ok(Box::new(ChildWorker { child }))
    }
}

/// A worker running as a child process. Dropping it kills the child.
#[derive(Debug)]
pub struct ChildWorker {
    child: Child,
}

#[async_trait]
impl WorkerProcess for ChildWorker {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self) -> std::io::Result<WorkerExit> {
        self.child.wait().await.map(WorkerExit::from)
    }
}
