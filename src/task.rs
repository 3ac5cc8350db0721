//! Task and execution management
//!
//! Every future is resolved by a background task. This module provides the
//! [Executor] that runs those tasks and the [Config] it is built from. Two
//! execution models are available:
//!
//! 1. **Thread per task** (the default). Every task gets a fresh OS thread.
//!    There is no limit on the number of tasks in flight.
//! 2. **Worker pool**. A fixed number of threads take tasks from a shared FIFO
//!    queue. Select it with [Config::with_workers] or the `FUTURA_WORKERS`
//!    environment variable.
//!
//! Futures created through the associated functions of
//! [Future](crate::future::Future) run on the [global](Executor::global)
//! executor. Futures created through an executor's own methods run on that
//! executor, and so does everything chained onto them.
//!
//! # Example
//!
//! ```
//! use futura::task::{Config, Executor};
//!
//! let pool = Executor::new(Config::default().with_workers(2)).unwrap();
//! let f = pool.spawn(|| 2 + 8).then(|x| x * 2);
//! assert_eq!(f.join(), 20);
//! pool.shutdown();
//! ```
//!
//! # Threading Model
//!
//! Combinators and aggregators never park a worker while they wait for the
//! futures they depend on; their task is queued only once those futures have
//! resolved. A pool can therefore run arbitrarily long chains with a single
//! worker. What a pool *cannot* protect against is a callback that itself calls
//! [join](crate::future::Future::join) on a future queued behind it on the
//! same pool; with every worker blocked that way, nothing makes progress.
//!
//! Deadline threads used by [timeout](crate::future::Future::timeout) and
//! [delay](crate::future::Future::delay) are always dedicated threads, never
//! pool workers.
use std::{
    env, fmt, io, mem,
    num::NonZeroUsize,
    sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError},
    thread::{self, JoinHandle},
};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, trace, warn};

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

const DEFAULT_THREAD_NAME: &str = "futura";

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Executor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    workers: Option<NonZeroUsize>,
    thread_name: String,
    stack_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: None,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
            stack_size: None,
        }
    }
}

fn env_usize(key: &str) -> Option<usize> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(env::VarError::NotPresent) => return None,
        Err(e) => {
            warn!("ignoring {key}: {e}");
            return None;
        }
    };

    match value.trim().parse() {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("ignoring {key}={value:?}: {e}");
            None
        }
    }
}

impl Config {
    /// Run tasks on a pool of `n` worker threads. `0` selects the thread per
    /// task model.
    pub fn with_workers(mut self, n: usize) -> Self {
        self.workers = NonZeroUsize::new(n);
        self
    }

    /// Name given to every thread the executor starts. NUL bytes are not
    /// allowed in thread names and are stripped.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        let mut name = name.into();

        if name.contains('\0') {
            warn!("stripping NUL bytes from thread name {name:?}");
            name.retain(|c| c != '\0');
        }

        self.thread_name = name;
        self
    }

    /// Stack size, in bytes, of every thread the executor starts.
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// The default configuration, overridden by the `FUTURA_WORKERS` and
    /// `FUTURA_STACK_SIZE` environment variables. Values that do not parse are
    /// logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(n) = env_usize("FUTURA_WORKERS") {
            config = config.with_workers(n);
        }

        if let Some(bytes) = env_usize("FUTURA_STACK_SIZE") {
            config = config.with_stack_size(bytes);
        }

        config
    }

    /// Number of pool workers, or `None` for thread per task.
    pub fn workers(&self) -> Option<usize> {
        self.workers.map(NonZeroUsize::get)
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    pub fn stack_size(&self) -> Option<usize> {
        self.stack_size
    }

    fn builder(&self, name: String) -> thread::Builder {
        let builder = thread::Builder::new().name(name);

        match self.stack_size {
            Some(bytes) => builder.stack_size(bytes),
            None => builder,
        }
    }
}

struct WorkerPool {
    queue: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    fn new(config: &Config, n: usize) -> io::Result<Self> {
        let (tx, rx) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(n);

        for id in 0..n {
            let rx = rx.clone();
            let handle = config
                .builder(format!("{}-worker-{id}", config.thread_name))
                .spawn(move || Self::worker_loop(rx))?;

            workers.push(handle);
        }

        debug!("started worker pool with {n} workers");

        Ok(Self {
            queue: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        })
    }

    fn worker_loop(rx: Receiver<Job>) {
        // Ends once the sender is gone and the queue has drained.
        for job in rx {
            job();
        }

        trace!("worker exiting");
    }

    fn submit(&self, job: Job) {
        let rejected = match lock(&self.queue).as_ref() {
            Some(tx) => tx.send(job).err().map(|e| e.0),
            None => Some(job),
        };

        // Dropped outside the queue lock: dropping a job resolves its future,
        // which may submit more work.
        if let Some(job) = rejected {
            warn!("executor has been shut down, dropping task");
            drop(job);
        }
    }

    fn shutdown(&self) {
        drop(lock(&self.queue).take());

        let workers = mem::take(&mut *lock(&self.workers));
        let me = thread::current().id();

        for worker in workers {
            if worker.thread().id() == me {
                continue;
            }

            let _ = worker.join();
        }

        debug!("worker pool shut down");
    }
}

struct Inner {
    config: Config,
    pool: Option<WorkerPool>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Let idle workers exit; queued jobs still run.
        if let Some(pool) = &self.pool {
            drop(lock(&pool.queue).take());
        }
    }
}

/// Runs the background tasks that resolve futures.
///
/// An executor is a cheap handle; clones share the same threads. See the
/// [module-level documentation](self) for more information.
#[derive(Clone)]
pub struct Executor {
    inner: Arc<Inner>,
}

static GLOBAL: OnceLock<Executor> = OnceLock::new();

impl Executor {
    /// Create an executor. Fails only if the threads of a worker pool cannot be
    /// started.
    pub fn new(config: Config) -> io::Result<Self> {
        let pool = match config.workers() {
            Some(n) => Some(WorkerPool::new(&config, n)?),
            None => None,
        };

        Ok(Self {
            inner: Arc::new(Inner { config, pool }),
        })
    }

    /// An executor that starts a thread for every task.
    pub fn thread_per_task(config: Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: config.with_workers(0),
                pool: None,
            }),
        }
    }

    /// The process wide executor, created on first use from
    /// [Config::from_env].
    pub fn global() -> &'static Executor {
        GLOBAL.get_or_init(|| {
            let config = Config::from_env();

            Executor::new(config.clone()).unwrap_or_else(|e| {
                warn!("failed to start worker pool ({e}), using a thread per task");
                Executor::thread_per_task(config)
            })
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Run `job` in the background.
    ///
    /// If the job cannot be started (the OS refuses a thread, or the executor
    /// has been shut down) it is dropped without running.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        match &self.inner.pool {
            Some(pool) => pool.submit(Box::new(job)),
            None => self.spawn_thread(&self.inner.config.thread_name, Box::new(job)),
        }
    }

    /// Run `job` on a thread of its own, whatever the execution model.
    pub(crate) fn execute_dedicated(&self, role: &str, job: impl FnOnce() + Send + 'static) {
        let name = format!("{}-{role}", self.inner.config.thread_name);
        self.spawn_thread(&name, Box::new(job));
    }

    fn spawn_thread(&self, name: &str, job: Job) {
        if let Err(e) = self.inner.config.builder(name.to_owned()).spawn(job) {
            error!("failed to spawn thread {name:?}: {e}");
        }
    }

    /// Stop a worker pool.
    ///
    /// Tasks already queued still run; tasks submitted from now on are
    /// dropped and their futures fail with
    /// [Abandoned](crate::error::ErrorKind::Abandoned). Blocks until the
    /// workers have exited. Has no effect on a thread per task executor.
    pub fn shutdown(&self) {
        if let Some(pool) = &self.inner.pool {
            pool.shutdown();
        }
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.inner.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            mpsc::channel,
            Arc,
        },
        thread,
        time::Duration,
    };

    use super::{Config, Executor};

    #[test]
    fn config_builder() {
        let config = Config::default()
            .with_workers(3)
            .with_thread_name("io")
            .with_stack_size(64 * 1024);

        assert_eq!(config.workers(), Some(3));
        assert_eq!(config.thread_name(), "io");
        assert_eq!(config.stack_size(), Some(64 * 1024));
        assert_eq!(Config::default().with_workers(0).workers(), None);
    }

    #[test]
    fn thread_name_without_nul() {
        let config = Config::default().with_thread_name("bad\0name");
        assert_eq!(config.thread_name(), "badname");

        let exec = Executor::thread_per_task(config);
        let (tx, rx) = channel();

        exec.execute(move || {
            tx.send(thread::current().name().map(str::to_owned)).unwrap();
        });

        assert_eq!(rx.recv().unwrap().as_deref(), Some("badname"));
    }

    #[test]
    fn thread_per_task_runs_jobs() {
        let exec = Executor::thread_per_task(Config::default().with_thread_name("tpt"));
        let (tx, rx) = channel();

        for i in 0..4 {
            let tx = tx.clone();
            exec.execute(move || {
                let name = thread::current().name().map(str::to_owned);
                tx.send((i, name)).unwrap();
            });
        }

        let mut seen: Vec<_> = rx.iter().take(4).collect();
        seen.sort();

        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|(_, name)| name.as_deref() == Some("tpt")));
    }

    #[test]
    fn pool_runs_jobs_on_workers() -> anyhow::Result<()> {
        let exec = Executor::new(Config::default().with_workers(2).with_thread_name("p"))?;
        let count = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = channel();

        for _ in 0..32 {
            let count = count.clone();
            let tx = tx.clone();
            exec.execute(move || {
                count.fetch_add(1, Ordering::SeqCst);
                tx.send(thread::current().name().map(str::to_owned)).unwrap();
            });
        }

        let names: Vec<_> = rx.iter().take(32).collect();
        assert_eq!(count.load(Ordering::SeqCst), 32);
        assert!(names
            .iter()
            .all(|n| n.as_deref().is_some_and(|n| n.starts_with("p-worker-"))));

        exec.shutdown();

        Ok(())
    }

    #[test]
    fn pool_drops_jobs_after_shutdown() -> anyhow::Result<()> {
        let exec = Executor::new(Config::default().with_workers(1))?;
        exec.shutdown();

        let ran = Arc::new(AtomicUsize::new(0));
        {
            let ran = ran.clone();
            exec.execute(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            });
        }

        thread::sleep(Duration::from_millis(50));
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        Ok(())
    }
}
