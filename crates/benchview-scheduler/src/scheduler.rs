//! Task scheduler - routes tasks to worker slots.
//!
//! A single dispatcher task owns the admission queue, the correlation table
//! and every slot's busy flag, so none of them needs a lock. Slots run their
//! worker concurrently and report back over a completion channel; every
//! completion frees a slot and immediately re-runs admission.
//!
//! Task deadlines are enforced by the dispatcher as well. An expired task is
//! answered with [`SchedulerError::Timeout`], its worker is cancelled and its
//! slot is free for the next task.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use benchview_core::{StatValue, TransactionId};

use crate::{
    SchedulerConfig, SchedulerError, StatsRequest, TaskMessage, Worker, WorkerFailure,
    WorkerRequest, WorkerResponse, STATS_CATEGORY,
};

type Reply = oneshot::Sender<Result<Value, SchedulerError>>;

tokio::task_local! {
    static SLOT: usize;
}

/// Index of the pool slot running the current worker call.
///
/// `None` outside of [`Worker::run`].
pub fn current_slot() -> Option<usize> {
    SLOT.try_with(|slot| *slot).ok()
}

/// Point-in-time view of the scheduler's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerSnapshot {
    /// Tasks waiting for a free slot.
    pub queued: usize,

    /// Transactions handed to a slot and not yet answered.
    pub in_flight: usize,

    /// Busy slots per category.
    pub busy: BTreeMap<String, usize>,

    /// The id the next admitted task will get.
    pub next_transaction: TransactionId,
}

enum Command {
    Submit(Pending),
    Snapshot(oneshot::Sender<SchedulerSnapshot>),
}

struct Pending {
    category: String,
    data: Value,
    deadline: Option<Instant>,
    reply: Reply,
}

/// A request as handed to a slot, with the signal that cancels it.
struct Assignment {
    request: WorkerRequest,
    cancel: oneshot::Receiver<()>,
}

struct Slot {
    busy: Option<TransactionId>,
    tx: mpsc::UnboundedSender<Assignment>,
}

struct InFlight {
    category: String,
    slot: usize,
    deadline: Option<Instant>,
    cancel: oneshot::Sender<()>,
    reply: Reply,
}

/// Handle to the eventual result of one task.
#[derive(Debug)]
pub struct TaskHandle {
    rx: oneshot::Receiver<Result<Value, SchedulerError>>,
}

impl TaskHandle {
    /// Wait for the worker's result.
    ///
    /// Resolves with [`SchedulerError::Timeout`] once the task's deadline,
    /// counted from submission, has passed.
    pub async fn result(self) -> Result<Value, SchedulerError> {
        self.rx.await.map_err(|_| SchedulerError::Closed)?
    }

    /// Wait for the result and deserialize it.
    pub async fn result_as<T: DeserializeOwned>(self) -> Result<T, SchedulerError> {
        Ok(serde_json::from_value(self.result().await?)?)
    }

    /// Wait for the result of a `stats` task.
    pub async fn stats(self) -> Result<StatValue, SchedulerError> {
        self.result_as().await
    }
}

/// Task scheduler.
pub struct Scheduler {
    commands: mpsc::UnboundedSender<Command>,
    categories: HashSet<String>,
    task_timeout: Option<Duration>,
    dispatcher: JoinHandle<()>,
}

impl Scheduler {
    /// Start the dispatcher and one slot task per configured worker.
    ///
    /// Every configured category needs an entry in `workers`. Must be called
    /// from within a tokio runtime.
    pub fn start(
        config: SchedulerConfig,
        workers: HashMap<String, Arc<dyn Worker>>,
    ) -> Result<Self, SchedulerError> {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let mut pools: HashMap<String, Vec<Slot>> = HashMap::new();

        for pool in &config.pools {
            if pool.workers == 0 {
                return Err(SchedulerError::EmptyPool(pool.category.clone()));
            }
            let worker = workers
                .get(&pool.category)
                .ok_or_else(|| SchedulerError::MissingWorker(pool.category.clone()))?;

            let slots = (0..pool.workers)
                .map(|index| {
                    let (tx, rx) = mpsc::unbounded_channel();
                    tokio::spawn(run_slot(
                        pool.category.clone(),
                        index,
                        Arc::clone(worker),
                        rx,
                        done_tx.clone(),
                    ));
                    Slot { busy: None, tx }
                })
                .collect();
            pools.insert(pool.category.clone(), slots);

            info!(category = %pool.category, workers = pool.workers, "Worker pool started");
        }
        drop(done_tx);

        let task_timeout = config.task_timeout();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher {
            queue: VecDeque::new(),
            pools,
            in_flight: HashMap::new(),
            next_transaction: TransactionId::new(1),
            task_timeout,
            commands: command_rx,
            completions: done_rx,
            closed: false,
        };

        Ok(Self {
            commands,
            categories: config.pools.iter().map(|p| p.category.clone()).collect(),
            task_timeout,
            dispatcher: tokio::spawn(dispatcher.run()),
        })
    }

    /// Queue a task. Fails immediately if the category has no pool.
    pub fn enqueue(&self, category: &str, data: Value) -> Result<TaskHandle, SchedulerError> {
        if !self.categories.contains(category) {
            return Err(SchedulerError::UnknownCategory(category.to_string()));
        }

        let (reply, rx) = oneshot::channel();
        let deadline = self
            .task_timeout
            .and_then(|limit| Instant::now().checked_add(limit));
        self.commands
            .send(Command::Submit(Pending {
                category: category.to_string(),
                data,
                deadline,
                reply,
            }))
            .map_err(|_| SchedulerError::Closed)?;

        trace!(category = %category, "Task queued");
        Ok(TaskHandle { rx })
    }

    /// Queue a task given as a protocol message.
    pub fn submit(&self, message: TaskMessage) -> Result<TaskHandle, SchedulerError> {
        self.enqueue(&message.category, message.data)
    }

    /// Queue a statistics computation over the given values.
    pub fn compute_stats(&self, values: Vec<Option<f64>>) -> Result<TaskHandle, SchedulerError> {
        let data = serde_json::to_value(StatsRequest { values })?;
        self.enqueue(STATS_CATEGORY, data)
    }

    /// Current queue, transaction and slot counts.
    ///
    /// Fails with [`SchedulerError::Closed`] if the dispatcher has stopped.
    pub async fn snapshot(&self) -> Result<SchedulerSnapshot, SchedulerError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot(tx))
            .map_err(|_| SchedulerError::Closed)?;
        rx.await.map_err(|_| SchedulerError::Closed)
    }

    /// Stop accepting tasks and wait until queued and in-flight work is done
    /// or has expired.
    pub async fn shutdown(self) {
        let Self {
            commands,
            dispatcher,
            ..
        } = self;
        drop(commands);
        if let Err(e) = dispatcher.await {
            warn!(error = %e, "Dispatcher terminated abnormally");
        }
        info!("Scheduler shut down");
    }
}

struct Dispatcher {
    queue: VecDeque<Pending>,
    pools: HashMap<String, Vec<Slot>>,
    in_flight: HashMap<TransactionId, InFlight>,
    next_transaction: TransactionId,
    task_timeout: Option<Duration>,
    commands: mpsc::UnboundedReceiver<Command>,
    completions: mpsc::UnboundedReceiver<WorkerResponse>,
    closed: bool,
}

impl Dispatcher {
    async fn run(mut self) {
        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                command = self.commands.recv(), if !self.closed => match command {
                    Some(Command::Submit(pending)) => self.queue.push_back(pending),
                    Some(Command::Snapshot(tx)) => {
                        let _ = tx.send(self.snapshot());
                    }
                    None => {
                        debug!(queued = self.queue.len(), in_flight = self.in_flight.len(), "Scheduler closing");
                        self.closed = true;
                    }
                },
                Some(response) = self.completions.recv() => self.complete(response),
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.expire(Instant::now());
                }
                else => break,
            }

            self.dispatch();

            if self.closed && self.queue.is_empty() && self.in_flight.is_empty() {
                break;
            }
        }
    }

    /// Earliest deadline of any queued or in-flight task.
    fn next_deadline(&self) -> Option<Instant> {
        self.queue
            .iter()
            .filter_map(|p| p.deadline)
            .chain(self.in_flight.values().filter_map(|f| f.deadline))
            .min()
    }

    /// Answer every task whose deadline has passed with a timeout. Expired
    /// in-flight workers are cancelled and their slots freed.
    fn expire(&mut self, now: Instant) {
        let limit = self.task_timeout.unwrap_or_default();
        let expired = |deadline: Option<Instant>| deadline.is_some_and(|d| d <= now);

        let (timed_out, waiting): (VecDeque<_>, VecDeque<_>) = self
            .queue
            .drain(..)
            .partition(|pending| expired(pending.deadline));
        self.queue = waiting;
        for pending in timed_out {
            debug!(category = %pending.category, "Task expired before dispatch");
            let _ = pending.reply.send(Err(SchedulerError::Timeout(limit)));
        }

        let transactions: Vec<TransactionId> = self
            .in_flight
            .iter()
            .filter(|(_, entry)| expired(entry.deadline))
            .map(|(transaction, _)| *transaction)
            .collect();
        for transaction in transactions {
            let Some(entry) = self.in_flight.remove(&transaction) else {
                continue;
            };
            warn!(
                category = %entry.category,
                slot = entry.slot,
                transaction = %transaction,
                "Worker missed its deadline, cancelling"
            );
            self.release(&entry.category, entry.slot);
            let _ = entry.cancel.send(());
            let _ = entry.reply.send(Err(SchedulerError::Timeout(limit)));
        }
    }

    /// Admit queued tasks to free slots. Order is preserved within a
    /// category; a saturated category does not hold back the others.
    fn dispatch(&mut self) {
        let mut waiting = VecDeque::with_capacity(self.queue.len());

        while let Some(pending) = self.queue.pop_front() {
            if pending.reply.is_closed() {
                debug!(category = %pending.category, "Dropping task whose caller stopped waiting");
                continue;
            }
            match self.free_slot(&pending.category) {
                Some(slot) => self.assign(pending, slot),
                None => waiting.push_back(pending),
            }
        }

        self.queue = waiting;
    }

    fn free_slot(&self, category: &str) -> Option<usize> {
        self.pools
            .get(category)?
            .iter()
            .position(|slot| slot.busy.is_none())
    }

    fn release(&mut self, category: &str, index: usize) {
        if let Some(slot) = self
            .pools
            .get_mut(category)
            .and_then(|slots| slots.get_mut(index))
        {
            slot.busy = None;
        }
    }

    fn assign(&mut self, pending: Pending, index: usize) {
        let transaction = self.next_transaction;
        self.next_transaction = transaction.next();

        let Some(slot) = self
            .pools
            .get_mut(&pending.category)
            .and_then(|slots| slots.get_mut(index))
        else {
            return;
        };
        debug_assert!(slot.busy.is_none(), "slot already holds a transaction");

        let (cancel, cancelled) = oneshot::channel();
        let assignment = Assignment {
            request: WorkerRequest {
                transaction,
                data: pending.data,
            },
            cancel: cancelled,
        };
        if slot.tx.send(assignment).is_err() {
            warn!(category = %pending.category, slot = index, "Worker slot is gone");
            let _ = pending.reply.send(Err(SchedulerError::WorkerFailed(
                WorkerFailure::new("worker slot unavailable"),
            )));
            return;
        }
        slot.busy = Some(transaction);

        trace!(category = %pending.category, slot = index, transaction = %transaction, "Task dispatched");
        self.in_flight.insert(
            transaction,
            InFlight {
                category: pending.category,
                slot: index,
                deadline: pending.deadline,
                cancel,
                reply: pending.reply,
            },
        );
    }

    fn complete(&mut self, response: WorkerResponse) {
        let Some(entry) = self.in_flight.remove(&response.transaction) else {
            debug!(transaction = %response.transaction, "Discarding completion for unknown or expired transaction");
            return;
        };
        self.release(&entry.category, entry.slot);

        if let Err(failure) = &response.result {
            warn!(
                category = %entry.category,
                transaction = %response.transaction,
                error = %failure,
                "Worker reported failure"
            );
        }
        let result = response.result.map_err(SchedulerError::WorkerFailed);
        if entry.reply.send(result).is_err() {
            debug!(transaction = %response.transaction, "Discarding result, caller stopped waiting");
        }
    }

    fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            queued: self.queue.len(),
            in_flight: self.in_flight.len(),
            busy: self
                .pools
                .iter()
                .map(|(category, slots)| {
                    let busy = slots.iter().filter(|s| s.busy.is_some()).count();
                    (category.clone(), busy)
                })
                .collect(),
            next_transaction: self.next_transaction,
        }
    }
}

/// One pool member: runs its worker for one request at a time.
async fn run_slot(
    category: String,
    index: usize,
    worker: Arc<dyn Worker>,
    mut assignments: mpsc::UnboundedReceiver<Assignment>,
    done: mpsc::UnboundedSender<WorkerResponse>,
) {
    while let Some(Assignment { request, mut cancel }) = assignments.recv().await {
        let WorkerRequest { transaction, data } = request;
        let worker = Arc::clone(&worker);
        // A panicking worker must still answer its transaction.
        let mut task = tokio::spawn(SLOT.scope(index, async move { worker.run(data).await }));

        let result = tokio::select! {
            joined = &mut task => match joined {
                Ok(result) => result,
                Err(e) => Err(WorkerFailure::new(format!("Worker aborted: {e}"))),
            },
            Ok(()) = &mut cancel => {
                task.abort();
                // The next assignment must not overlap the cancelled call.
                let _ = task.await;
                debug!(category = %category, slot = index, transaction = %transaction, "Worker cancelled");
                continue;
            }
        };

        if done.send(WorkerResponse { transaction, result }).is_err() {
            break;
        }
    }
    trace!(category = %category, slot = index, "Worker slot stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Notify;

    use crate::DEFAULT_STATS_WORKERS;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Echoes its payload after a delay and tracks concurrency, overall
    /// and per slot.
    #[derive(Default)]
    struct EchoWorker {
        delay: Duration,
        active: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
        order: Mutex<Vec<Value>>,
        slot_active: Mutex<HashMap<usize, usize>>,
        slot_peak: Mutex<HashMap<usize, usize>>,
    }

    #[async_trait]
    impl Worker for EchoWorker {
        async fn run(&self, data: Value) -> Result<Value, WorkerFailure> {
            let slot = current_slot().expect("worker runs inside a slot");
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.order.lock().unwrap().push(data.clone());
            {
                let mut active = self.slot_active.lock().unwrap();
                let count = active.entry(slot).or_default();
                *count += 1;
                let mut peak = self.slot_peak.lock().unwrap();
                let max = peak.entry(slot).or_default();
                *max = (*max).max(*count);
            }

            tokio::time::sleep(self.delay).await;

            *self.slot_active.lock().unwrap().entry(slot).or_default() -= 1;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(data)
        }
    }

    /// Records each payload, then blocks until released.
    #[derive(Default)]
    struct GateWorker {
        gate: Notify,
        seen: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl Worker for GateWorker {
        async fn run(&self, data: Value) -> Result<Value, WorkerFailure> {
            self.seen.lock().unwrap().push(data.clone());
            self.gate.notified().await;
            Ok(data)
        }
    }

    /// Never answers payloads equal to `"hang"`.
    struct HangingWorker;

    #[async_trait]
    impl Worker for HangingWorker {
        async fn run(&self, data: Value) -> Result<Value, WorkerFailure> {
            if data == json!("hang") {
                std::future::pending::<()>().await;
            }
            Ok(data)
        }
    }

    struct FailingWorker;

    #[async_trait]
    impl Worker for FailingWorker {
        async fn run(&self, _data: Value) -> Result<Value, WorkerFailure> {
            Err(WorkerFailure::new("division by zero"))
        }
    }

    struct PanickingWorker;

    #[async_trait]
    impl Worker for PanickingWorker {
        async fn run(&self, _data: Value) -> Result<Value, WorkerFailure> {
            panic!("worker bug");
        }
    }

    fn workers(entries: Vec<(&str, Arc<dyn Worker>)>) -> HashMap<String, Arc<dyn Worker>> {
        entries
            .into_iter()
            .map(|(category, worker)| (category.to_string(), worker))
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_twenty_tasks_on_eight_workers() {
        init_tracing();
        let echo = Arc::new(EchoWorker {
            delay: Duration::from_millis(20),
            ..Default::default()
        });
        let scheduler = Scheduler::start(
            SchedulerConfig::default(),
            workers(vec![(STATS_CATEGORY, echo.clone() as Arc<dyn Worker>)]),
        )
        .unwrap();

        let handles: Vec<_> = (0..20)
            .map(|i| scheduler.enqueue(STATS_CATEGORY, json!(i)).unwrap())
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.result().await.unwrap());
        }

        // Every caller got its own payload back exactly once.
        assert_eq!(results, (0..20).map(|i| json!(i)).collect::<Vec<_>>());
        assert_eq!(echo.calls.load(Ordering::SeqCst), 20);
        assert!(echo.peak.load(Ordering::SeqCst) <= 8);

        // No slot ever ran two transactions at once.
        let slot_peak = echo.slot_peak.lock().unwrap().clone();
        assert!(!slot_peak.is_empty());
        assert!(slot_peak.keys().all(|slot| *slot < DEFAULT_STATS_WORKERS));
        assert!(slot_peak.values().all(|peak| *peak == 1), "{slot_peak:?}");

        let snapshot = scheduler.snapshot().await.unwrap();
        assert_eq!(snapshot.in_flight, 0);
        assert_eq!(snapshot.queued, 0);
        assert_eq!(snapshot.busy[STATS_CATEGORY], 0);
        assert_eq!(snapshot.next_transaction, TransactionId::new(21));

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_category_fails_synchronously() {
        let scheduler = Scheduler::start(SchedulerConfig::default(), default_stats()).unwrap();
        let err = scheduler.enqueue("render", json!({})).unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownCategory(c) if c == "render"));
        scheduler.shutdown().await;
    }

    fn default_stats() -> HashMap<String, Arc<dyn Worker>> {
        crate::default_workers()
    }

    #[tokio::test]
    async fn test_start_validates_pools() {
        let config = SchedulerConfig::empty().with_pool("render", 2);
        assert!(matches!(
            Scheduler::start(config, default_stats()),
            Err(SchedulerError::MissingWorker(c)) if c == "render"
        ));

        let config = SchedulerConfig::default().with_pool(STATS_CATEGORY, 0);
        assert!(matches!(
            Scheduler::start(config, default_stats()),
            Err(SchedulerError::EmptyPool(_))
        ));
    }

    #[tokio::test]
    async fn test_fifo_admission_within_category() {
        let echo = Arc::new(EchoWorker::default());
        let config = SchedulerConfig::empty().with_pool("serial", 1);
        let scheduler = Scheduler::start(config, workers(vec![("serial", echo.clone() as Arc<dyn Worker>)])).unwrap();

        let handles: Vec<_> = (0..5)
            .map(|i| scheduler.enqueue("serial", json!(i)).unwrap())
            .collect();
        for handle in handles {
            handle.result().await.unwrap();
        }

        let order = echo.order.lock().unwrap().clone();
        assert_eq!(order, (0..5).map(|i| json!(i)).collect::<Vec<_>>());
        assert_eq!(echo.peak.load(Ordering::SeqCst), 1);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_saturated_category_does_not_block_others() {
        let gate = Arc::new(GateWorker::default());
        let echo = Arc::new(EchoWorker::default());
        let config = SchedulerConfig::empty()
            .with_pool("slow", 1)
            .with_pool("fast", 1);
        let scheduler = Scheduler::start(
            config,
            workers(vec![
                ("slow", gate.clone() as Arc<dyn Worker>),
                ("fast", echo.clone() as Arc<dyn Worker>),
            ]),
        )
        .unwrap();

        let slow_a = scheduler.enqueue("slow", json!("a")).unwrap();
        let slow_b = scheduler.enqueue("slow", json!("b")).unwrap();
        let fast = scheduler.enqueue("fast", json!("c")).unwrap();

        assert_eq!(fast.result().await.unwrap(), json!("c"));

        let snapshot = scheduler.snapshot().await.unwrap();
        assert_eq!(snapshot.queued, 1);
        assert_eq!(snapshot.in_flight, 1);
        assert_eq!(snapshot.busy["slow"], 1);

        // Freeing the slot admits the queued task without any polling.
        gate.gate.notify_one();
        assert_eq!(slow_a.result().await.unwrap(), json!("a"));
        gate.gate.notify_one();
        assert_eq!(slow_b.result().await.unwrap(), json!("b"));

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_worker_failure_reaches_caller() {
        let config = SchedulerConfig::empty().with_pool("fail", 2);
        let scheduler =
            Scheduler::start(config, workers(vec![("fail", Arc::new(FailingWorker) as Arc<dyn Worker>)])).unwrap();

        let err = scheduler
            .enqueue("fail", json!(null))
            .unwrap()
            .result()
            .await
            .unwrap_err();
        match err {
            SchedulerError::WorkerFailed(failure) => assert_eq!(failure.message, "division by zero"),
            other => panic!("Expected WorkerFailed, got {other:?}"),
        }

        // The slot was freed and keeps serving.
        assert!(scheduler.enqueue("fail", json!(null)).unwrap().result().await.is_err());
        assert_eq!(scheduler.snapshot().await.unwrap().busy["fail"], 0);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_worker_panic_becomes_failure() {
        let config = SchedulerConfig::empty().with_pool("buggy", 1);
        let scheduler =
            Scheduler::start(config, workers(vec![("buggy", Arc::new(PanickingWorker) as Arc<dyn Worker>)])).unwrap();

        let err = scheduler
            .enqueue("buggy", json!(1))
            .unwrap()
            .result()
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::WorkerFailed(_)));
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_worker_frees_its_slot() {
        init_tracing();
        let config = SchedulerConfig::empty()
            .with_pool("slow", 1)
            .with_task_timeout(Some(Duration::from_millis(50)));
        let scheduler = Scheduler::start(
            config,
            workers(vec![("slow", Arc::new(HangingWorker) as Arc<dyn Worker>)]),
        )
        .unwrap();

        let err = scheduler
            .enqueue("slow", json!("hang"))
            .unwrap()
            .result()
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::Timeout(d) if d == Duration::from_millis(50)));

        let snapshot = scheduler.snapshot().await.unwrap();
        assert_eq!(snapshot.in_flight, 0);
        assert_eq!(snapshot.busy["slow"], 0);

        // The only slot serves the next task.
        let value = scheduler
            .enqueue("slow", json!("ok"))
            .unwrap()
            .result()
            .await
            .unwrap();
        assert_eq!(value, json!("ok"));

        // A hung worker cannot hold shutdown hostage.
        let _hung = scheduler.enqueue("slow", json!("hang")).unwrap();
        let finished = tokio::time::timeout(Duration::from_secs(3600), scheduler.shutdown()).await;
        assert!(finished.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_task_expires() {
        let config = SchedulerConfig::empty()
            .with_pool("slow", 1)
            .with_task_timeout(Some(Duration::from_millis(50)));
        let scheduler = Scheduler::start(
            config,
            workers(vec![("slow", Arc::new(HangingWorker) as Arc<dyn Worker>)]),
        )
        .unwrap();

        let running = scheduler.enqueue("slow", json!("hang")).unwrap();
        let queued = scheduler.enqueue("slow", json!("hang")).unwrap();

        assert!(matches!(running.result().await, Err(SchedulerError::Timeout(_))));
        assert!(matches!(queued.result().await, Err(SchedulerError::Timeout(_))));

        let snapshot = scheduler.snapshot().await.unwrap();
        assert_eq!(snapshot.queued, 0);
        assert_eq!(snapshot.in_flight, 0);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_dropped_handle_is_never_dispatched() {
        let gate = Arc::new(GateWorker::default());
        let config = SchedulerConfig::empty().with_pool("serial", 1);
        let scheduler =
            Scheduler::start(config, workers(vec![("serial", gate.clone() as Arc<dyn Worker>)]))
                .unwrap();

        let first = scheduler.enqueue("serial", json!("a")).unwrap();
        let abandoned = scheduler.enqueue("serial", json!("b")).unwrap();
        let last = scheduler.enqueue("serial", json!("c")).unwrap();
        drop(abandoned);

        gate.gate.notify_one();
        assert_eq!(first.result().await.unwrap(), json!("a"));
        gate.gate.notify_one();
        assert_eq!(last.result().await.unwrap(), json!("c"));

        assert_eq!(*gate.seen.lock().unwrap(), vec![json!("a"), json!("c")]);
        assert_eq!(scheduler.snapshot().await.unwrap().next_transaction, TransactionId::new(3));
        scheduler.shutdown().await;
    }

    #[test]
    fn test_current_slot_outside_worker() {
        assert_eq!(current_slot(), None);
    }

    #[tokio::test]
    async fn test_compute_stats_end_to_end() {
        let scheduler = Scheduler::start(SchedulerConfig::default(), default_stats()).unwrap();

        let stats = scheduler
            .compute_stats(vec![Some(1.2), Some(5.0), None, Some(9.9)])
            .unwrap()
            .stats()
            .await
            .unwrap();
        assert_eq!(stats.min, Some(1.2));
        assert_eq!(stats.max, Some(9.9));
        assert_eq!(stats.median, Some(5.0));
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_submit_protocol_message() {
        let scheduler = Scheduler::start(SchedulerConfig::default(), default_stats()).unwrap();
        let message = TaskMessage::new(STATS_CATEGORY, json!({"values": [2.0, 4.0]}));
        let stats = scheduler.submit(message).unwrap().stats().await.unwrap();
        assert_eq!(stats.avg, Some(3.0));
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_finishes_queued_work() {
        let echo = Arc::new(EchoWorker {
            delay: Duration::from_millis(5),
            ..Default::default()
        });
        let config = SchedulerConfig::empty().with_pool("serial", 1);
        let scheduler = Scheduler::start(config, workers(vec![("serial", echo.clone() as Arc<dyn Worker>)])).unwrap();

        let handles: Vec<_> = (0..3)
            .map(|i| scheduler.enqueue("serial", json!(i)).unwrap())
            .collect();
        scheduler.shutdown().await;

        assert_eq!(echo.calls.load(Ordering::SeqCst), 3);
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.result().await.unwrap(), json!(i));
        }
    }
}
