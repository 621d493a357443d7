//! Keyed cache over async queries.
//!
//! Concurrent requests for an equal key share a single execution of the
//! query. Successful results stay cached until they are garbage collected;
//! errors are handed to every waiter of the failed execution and then
//! forgotten so the next request runs the query again.
//!
//! The cache only holds a weak handle to executions in flight. Once every
//! waiter is gone the execution is dropped and its entry collected.

use {
    futures::{
        FutureExt,
        future::{AbortHandle, Abortable, BoxFuture, Shared, WeakShared},
    },
    prometheus::{IntCounterVec, IntGaugeVec},
    std::{
        collections::HashMap,
        hash::Hash,
        sync::{
            Arc,
            Mutex,
            atomic::{AtomicU64, Ordering},
        },
        time::Duration,
    },
    thiserror::Error,
    tokio::time::Instant,
};

/// A query execution was aborted because its key got disabled while it was
/// running.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[error("query was cancelled")]
pub struct Cancelled;

type Execution<V, E> = BoxFuture<'static, Result<V, E>>;

enum State<V, E> {
    Running {
        result: WeakShared<Execution<V, E>>,
        abort: AbortHandle,
    },
    Done(V),
}

struct Entry<V, E> {
    /// Distinguishes executions for the same key.
    execution: u64,
    state: State<V, E>,
    /// Start of the execution, or its completion once done.
    updated: Instant,
}

impl<V: Clone, E: Clone> Entry<V, E> {
    fn running(&self) -> Option<Shared<Execution<V, E>>> {
        match &self.state {
            State::Running { result, .. } => result.upgrade(),
            State::Done(_) => None,
        }
    }

    fn value(&self) -> Option<V> {
        match &self.state {
            State::Done(value) => Some(value.clone()),
            State::Running { .. } => None,
        }
    }
}

pub struct QueryCache<K, V, E> {
    entries: Arc<Mutex<HashMap<K, Entry<V, E>>>>,
    executions: AtomicU64,
    cache_time: Duration,
    label: &'static str,
}

impl<K, V, E> QueryCache<K, V, E>
where
    K: Clone + Eq + Hash + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + From<Cancelled> + Send + Sync + 'static,
{
    /// Creates a cache whose results are kept for at least `cache_time`.
    /// `label` distinguishes the cache in metrics.
    pub fn new(label: &'static str, cache_time: Duration) -> Self {
        Self {
            entries: Default::default(),
            executions: AtomicU64::new(0),
            cache_time,
            label,
        }
    }

    /// Returns the result of the query for `key`, running `query` if there
    /// is neither a cached result nor an execution in flight.
    ///
    /// While `enabled` is false no query is started: a cached result is
    /// returned if there is one, `None` otherwise. An execution still in
    /// flight for the key is aborted and its waiters receive [`Cancelled`].
    pub async fn get<F>(&self, key: K, enabled: bool, query: F) -> Result<Option<V>, E>
    where
        F: FnOnce(&K) -> Execution<V, E>,
    {
        let (execution, result) = {
            let mut entries = self.entries.lock().unwrap();

            if !enabled {
                return Ok(self.disabled(&mut entries, &key));
            }

            let running = match entries.get(&key) {
                Some(entry) => {
                    if let Some(value) = entry.value() {
                        self.record_access("hits");
                        return Ok(Some(value));
                    }
                    entry.running().map(|result| (entry.execution, result))
                }
                None => None,
            };
            match running {
                Some(running) => {
                    self.record_access("hits");
                    running
                }
                None => {
                    self.record_access("misses");
                    self.start(&mut entries, key.clone(), query)
                }
            }
        };

        let output = result.await;
        let mut entries = self.entries.lock().unwrap();
        let is_same_execution = entries
            .get(&key)
            .is_some_and(|entry| entry.execution == execution);
        if is_same_execution {
            match &output {
                Ok(value) => {
                    if let Some(entry) = entries.get_mut(&key) {
                        entry.state = State::Done(value.clone());
                        entry.updated = Instant::now();
                    }
                }
                Err(_) => {
                    entries.remove(&key);
                    self.update_size(&entries);
                }
            }
        }
        output.map(Some)
    }

    fn start<F>(
        &self,
        entries: &mut HashMap<K, Entry<V, E>>,
        key: K,
        query: F,
    ) -> (u64, Shared<Execution<V, E>>)
    where
        F: FnOnce(&K) -> Execution<V, E>,
    {
        let execution = self.executions.fetch_add(1, Ordering::Relaxed);
        let (abort, registration) = AbortHandle::new_pair();
        let result = Abortable::new(query(&key), registration)
            .map(|result| result.unwrap_or_else(|_| Err(Cancelled.into())))
            .boxed()
            .shared();
        // unwrap because downgrade only returns None for completed futures and
        // this one has not been polled yet.
        let weak = result.downgrade().unwrap();
        entries.insert(
            key,
            Entry {
                execution,
                state: State::Running {
                    result: weak,
                    abort,
                },
                updated: Instant::now(),
            },
        );
        self.update_size(entries);
        (execution, result)
    }

    fn disabled(&self, entries: &mut HashMap<K, Entry<V, E>>, key: &K) -> Option<V> {
        match &entries.get(key)?.state {
            State::Done(value) => Some(value.clone()),
            State::Running { abort, .. } => {
                tracing::debug!(cache = self.label, "query disabled, cancelling execution");
                abort.abort();
                entries.remove(key);
                self.update_size(entries);
                None
            }
        }
    }

    /// The cached successful result for `key`, if any.
    pub fn cached(&self, key: &K) -> Option<V> {
        self.entries.lock().unwrap().get(key)?.value()
    }

    /// Forgets the entry for `key`. Waiters of an execution in flight still
    /// receive its result.
    pub fn invalidate(&self, key: &K) {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(key);
        self.update_size(&entries);
    }

    /// Drops results older than the cache time and executions nobody waits
    /// for anymore. Executions with waiters are kept regardless of their age.
    pub fn collect_garbage(&self) {
        let mut entries = self.entries.lock().unwrap();
        let cache_time = self.cache_time;
        entries.retain(|_, entry| match &entry.state {
            State::Running { result, .. } => result.upgrade().is_some(),
            State::Done(_) => entry.updated.elapsed() < cache_time,
        });
        self.update_size(&entries);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record_access(&self, result: &str) {
        Metrics::get()
            .query_cache_access
            .with_label_values(&[self.label, result])
            .inc();
    }

    fn update_size(&self, entries: &HashMap<K, Entry<V, E>>) {
        Metrics::get()
            .query_cache_entries
            .with_label_values(&[self.label])
            .set(i64::try_from(entries.len()).unwrap_or(i64::MAX));
    }
}

#[derive(prometheus_metric_storage::MetricStorage)]
struct Metrics {
    /// Query cache hits & misses
    #[metric(labels("cache", "result"))]
    query_cache_access: IntCounterVec,

    /// Number of cached and in flight queries
    #[metric(labels("cache"))]
    query_cache_entries: IntGaugeVec,
}

impl Metrics {
    fn get() -> &'static Self {
        Metrics::instance(observe::metrics::get_storage_registry()).unwrap()
    }
}
