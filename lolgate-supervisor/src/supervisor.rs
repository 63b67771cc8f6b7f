//! Worker pool supervision.

use std::fmt;
use std::future::Future;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tracing::{error, info, warn};

/// Pause before retrying a worker that failed to *launch*. Exits are
/// replaced immediately.
const LAUNCH_RETRY_DELAY: Duration = Duration::from_secs(1);

/// How a worker process ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerExit {
    /// Exit code, if it exited normally
    pub code: Option<i32>,
    /// Terminating signal, if killed (unix)
    pub signal: Option<i32>,
}

impl WorkerExit {
    /// Normal exit with `code`.
    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Returns true for a clean zero exit.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for WorkerExit {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => f.write_str("unknown status"),
        }
    }
}

/// A running worker.
#[async_trait]
pub trait WorkerProcess: Send {
    /// OS process id, if known.
    fn id(&self) -> Option<u32>;

    /// Resolves when the worker is gone.
    async fn wait(&mut self) -> std::io::Result<WorkerExit>;
}

/// Starts workers. Dropping a returned process must stop it.
pub trait WorkerLauncher: Send + Sync {
    /// Starts the worker for `slot`.
    fn launch(&self, slot: usize) -> std::io::Result<Box<dyn WorkerProcess>>;
}

/// Live counters, readable while the supervisor runs.
#[derive(Debug, Default)]
pub struct SupervisorStats {
    live: AtomicUsize,
    launched: AtomicUsize,
    restarts: AtomicUsize,
}

impl SupervisorStats {
    /// Workers currently running.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Workers launched since start, replacements included.
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    /// Worker exits that were answered with a replacement.
    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

type Running = BoxFuture<'static, (usize, Option<u32>, WorkerExit)>;

/// Keeps `target` workers alive.
pub struct Supervisor<L> {
    launcher: L,
    target: usize,
    retry_delay: Duration,
    stats: Arc<SupervisorStats>,
}

impl<L: WorkerLauncher> Supervisor<L> {
    /// Creates a supervisor for `target` workers (at least one).
    pub fn new(launcher: L, target: usize) -> Self {
        Self {
            launcher,
            target: target.max(1),
            retry_delay: LAUNCH_RETRY_DELAY,
            stats: Arc::new(SupervisorStats::default()),
        }
    }

    /// Overrides the pause between failed launch attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Configured pool size.
    pub fn target(&self) -> usize {
        self.target
    }

    /// Shared counters.
    pub fn stats(&self) -> Arc<SupervisorStats> {
        Arc::clone(&self.stats)
    }

    /// Runs the pool until `shutdown` resolves, then stops every worker.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut running: FuturesUnordered<Running> = FuturesUnordered::new();

        for slot in 0..self.target {
            tokio::select! {
                _ = &mut shutdown => return,
                worker = self.start(slot) => running.push(worker),
            }
        }
        info!(workers = self.target, "Worker pool started");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some((slot, pid, exit)) = running.next() => {
                    self.stats.live.fetch_sub(1, Ordering::SeqCst);
                    warn!(slot, pid, %exit, "Worker exited, launching replacement");
                    tokio::select! {
                        _ = &mut shutdown => break,
                        worker = self.start(slot) => {
                            self.stats.restarts.fetch_add(1, Ordering::SeqCst);
                            running.push(worker);
                        }
                    }
                }
            }
        }

        let stopping = running.len();
        drop(running);
        self.stats.live.store(0, Ordering::SeqCst);
        info!(workers = stopping, "Worker pool stopped");
    }

    /// Launches `slot`, retrying launch failures until one succeeds.
    async fn start(&self, slot: usize) -> Running {
        loop {
            match self.launcher.launch(slot) {
                Ok(mut worker) => {
                    let pid = worker.id();
                    self.stats.live.fetch_add(1, Ordering::SeqCst);
                    self.stats.launched.fetch_add(1, Ordering::SeqCst);
                    info!(slot, pid, "Worker launched");
                    return async move {
                        let exit = worker.wait().await.unwrap_or_else(|e| {
                            error!(slot, error = %e, "Lost track of worker");
                            WorkerExit::default()
                        });
                        (slot, pid, exit)
                    }
                    .boxed();
                }
                Err(e) => {
                    error!(slot, error = %e, "Failed to launch worker");
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }
}

/// Default pool size: one worker per available CPU.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    /// In-process worker that "exits" when its sender fires or drops.
    struct FakeWorker {
        exit: Option<oneshot::Receiver<i32>>,
    }

    #[async_trait]
    impl WorkerProcess for FakeWorker {
        fn id(&self) -> Option<u32> {
            None
        }

        async fn wait(&mut self) -> std::io::Result<WorkerExit> {
            let code = match self.exit.take() {
                Some(rx) => rx.await.unwrap_or(-1),
                None => -1,
            };
            Ok(WorkerExit::with_code(code))
        }
    }

    #[derive(Default)]
    struct FakeLauncher {
        handles: Mutex<Vec<(usize, oneshot::Sender<i32>)>>,
        failures_left: AtomicUsize,
    }

    impl FakeLauncher {
        fn crash(&self, slot: usize) {
            let mut handles = self.handles.lock().unwrap();
            let index = handles.iter().position(|(s, _)| *s == slot).unwrap();
            let (_, tx) = handles.remove(index);
            let _ = tx.send(1);
        }
    }

    impl WorkerLauncher for Arc<FakeLauncher> {
        fn launch(&self, slot: usize) -> std::io::Result<Box<dyn WorkerProcess>> {
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no binary"));
            }
            let (tx, rx) = oneshot::channel();
            self.handles.lock().unwrap().push((slot, tx));
            Ok(Box::new(FakeWorker { exit: Some(rx) }))
        }
    }

    async fn eventually(stats: &SupervisorStats, cond: impl Fn(&SupervisorStats) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond(stats) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn test_crashed_worker_is_replaced() {
        let launcher = Arc::new(FakeLauncher::default());
        let supervisor = Arc::new(Supervisor::new(launcher.clone(), 3));
        let stats = supervisor.stats();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let sup = Arc::clone(&supervisor);
        let task = tokio::spawn(async move {
            sup.run_until(async {
                let _ = stop_rx.await;
            })
            .await
        });

        eventually(&stats, |s| s.live() == 3).await;
        launcher.crash(1);
        eventually(&stats, |s| s.restarts() == 1).await;

        assert_eq!(stats.live(), 3);
        assert_eq!(stats.launched(), 4);

        stop_tx.send(()).unwrap();
        task.await.unwrap();
        assert_eq!(stats.live(), 0);
    }

    #[tokio::test]
    async fn test_every_exit_gets_a_replacement() {
        let launcher = Arc::new(FakeLauncher::default());
        let supervisor = Arc::new(Supervisor::new(launcher.clone(), 2));
        let stats = supervisor.stats();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let sup = Arc::clone(&supervisor);
        let task = tokio::spawn(async move {
            sup.run_until(async {
                let _ = stop_rx.await;
            })
            .await
        });

        for round in 1..=5 {
            eventually(&stats, |s| s.live() == 2).await;
            launcher.crash(round % 2);
            eventually(&stats, |s| s.restarts() == round).await;
        }
        eventually(&stats, |s| s.live() == 2).await;
        assert_eq!(stats.launched(), 7);

        stop_tx.send(()).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_launch_failures_are_retried() {
        let launcher = Arc::new(FakeLauncher::default());
        launcher.failures_left.store(2, Ordering::SeqCst);
        let supervisor = Arc::new(
            Supervisor::new(launcher.clone(), 1).with_retry_delay(Duration::from_millis(1)),
        );
        let stats = supervisor.stats();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let sup = Arc::clone(&supervisor);
        let task = tokio::spawn(async move {
            sup.run_until(async {
                let _ = stop_rx.await;
            })
            .await
        });

        eventually(&stats, |s| s.live() == 1).await;
        assert_eq!(stats.launched(), 1);

        stop_tx.send(()).unwrap();
        task.await.unwrap();
    }

    #[test]
    fn test_zero_target_is_clamped() {
        let supervisor = Supervisor::new(Arc::new(FakeLauncher::default()), 0);
        assert_eq!(supervisor.target(), 1);
        assert!(default_worker_count() >= 1);
    }

    #[test]
    fn test_exit_display() {
        assert_eq!(WorkerExit::with_code(3).to_string(), "exit code 3");
        assert_eq!(
            WorkerExit { code: None, signal: Some(9) }.to_string(),
            "signal 9"
        );
        assert!(WorkerExit::with_code(0).success());
    }
}
