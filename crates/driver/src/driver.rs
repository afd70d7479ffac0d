//! The driver proper: client surface, request queues, and the work loop.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use foldhash::HashMap;
use foldhash::HashMapExt;
use foldhash::HashSet;
use foldhash::HashSetExt;
use indexmap::IndexSet;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;

use kiln_perf::PerfLog;
use kiln_source::ContentOverlay;
use kiln_source::FileSystem;
use kiln_source::FileTracker;
use kiln_source::KnownFiles;
use kiln_source::SourceFactory;
use kiln_source::SourcePath;
use kiln_source::SourceUri;
use kiln_source::SyntaxParser;
use kiln_store::ByteStore;
use kiln_summary::LinkError;
use kiln_summary::Linker;
use kiln_summary::SdkBundle;
use kiln_summary::SummaryCache;
use kiln_summary::SummarySerializer;
use kiln_summary::decode_errors;
use kiln_summary::encode_errors;
use kiln_summary::keys;

use crate::AnalysisOptions;
use crate::AnalysisResult;
use crate::DiagnosticsEngine;
use crate::DriverError;
use crate::context::create_library_context;

/// The driver's global state: analyzing while work is pending, idle once
/// both queues have drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStatus {
    Idle,
    Analyzing,
}

/// The external collaborators handed to the driver at construction.
pub struct AnalysisHost<P, Z, L, E> {
    pub parser: P,
    pub serializer: Z,
    pub linker: L,
    pub engine: E,
    pub file_system: Arc<dyn FileSystem>,
    pub overlay: Arc<dyn ContentOverlay>,
    pub source_factory: Arc<dyn SourceFactory>,
    pub sdk: SdkBundle,
}

type ResultSender<R> = oneshot::Sender<Result<AnalysisResult<R>, DriverError>>;

/// Client-shared request state. Guarded by one mutex held only for set and
/// map edits; never across I/O and never across an await point.
struct RequestQueues<R> {
    explicit_files: HashSet<SourcePath>,
    files_to_analyze: IndexSet<SourcePath>,
    files_to_verify: IndexSet<SourcePath>,
    requested_files: HashMap<SourcePath, Vec<ResultSender<R>>>,
    priority_files: Vec<SourcePath>,
    shut_down: bool,
}

impl<R> Default for RequestQueues<R> {
    fn default() -> Self {
        Self {
            explicit_files: HashSet::new(),
            files_to_analyze: IndexSet::new(),
            files_to_verify: IndexSet::new(),
            requested_files: HashMap::new(),
            priority_files: Vec::new(),
            shut_down: false,
        }
    }
}

/// A cheap, cloneable handle through which clients drive the analysis.
///
/// Every operation mutates the shared queues and writes an advisory payload
/// to the wake channel; the loop inspects the queues on each iteration, so
/// payload contents never matter for correctness.
pub struct DriverClient<R> {
    queues: Arc<Mutex<RequestQueues<R>>>,
    wake: mpsc::UnboundedSender<String>,
    known_files: KnownFiles,
}

impl<R> Clone for DriverClient<R> {
    fn clone(&self) -> Self {
        Self { queues: Arc::clone(&self.queues), wake: self.wake.clone(), known_files: self.known_files.clone() }
    }
}

impl<R> DriverClient<R> {
    /// Adds `path` to the explicit file set and schedules its analysis.
    pub fn add_file(&self, path: impl Into<SourcePath>) {
        let path = path.into();
        {
            let mut queues = self.lock();
            if queues.shut_down {
                return;
            }

            queues.explicit_files.insert(path.clone());
            queues.files_to_analyze.insert(path);
        }

        self.wake("add_file");
    }

    /// Removes `path` from the explicit file set and the pending queue.
    ///
    /// Cached artifacts remain (they are content-addressed), and a result for
    /// this file that is already in flight may still be delivered.
    pub fn remove_file(&self, path: impl Into<SourcePath>) {
        let path = path.into();
        {
            let mut queues = self.lock();
            queues.explicit_files.remove(&path);
            queues.files_to_analyze.shift_remove(&path);
        }

        self.wake("remove_file");
    }

    /// Notifies the driver that the content of `path` may have changed. The
    /// path need not be explicit; its api signature is re-verified before the
    /// next analysis pass.
    pub fn change_file(&self, path: impl Into<SourcePath>) {
        let path = path.into();
        {
            let mut queues = self.lock();
            if queues.shut_down {
                return;
            }

            queues.files_to_verify.insert(path.clone());
            queues.files_to_analyze.insert(path);
        }

        self.wake("change_file");
    }

    /// Requests one result for `path`. Exactly one result resolves the
    /// returned future; further results for the path may still appear on the
    /// results stream.
    pub async fn get_result(&self, path: impl Into<SourcePath>) -> Result<AnalysisResult<R>, DriverError> {
        let path = path.into();
        let (sender, receiver) = oneshot::channel();
        {
            let mut queues = self.lock();
            if queues.shut_down {
                return Err(DriverError::ShutDown);
            }

            queues.requested_files.entry(path).or_default().push(sender);
        }

        self.wake("get_result");

        match receiver.await {
            Ok(outcome) => outcome,
            Err(_) => Err(DriverError::ShutDown),
        }
    }

    /// A reorder hint: priority paths may be processed before non-priority
    /// ones. No strict ordering is promised.
    pub fn set_priority_files(&self, paths: impl IntoIterator<Item = impl Into<SourcePath>>) {
        {
            let mut queues = self.lock();
            queues.priority_files = paths.into_iter().map(Into::into).collect();
        }

        self.wake("set_priority_files");
    }

    /// Every path the driver has materialized so far, explicit or discovered
    /// through imports.
    pub fn known_files(&self) -> Vec<SourcePath> {
        self.known_files.snapshot()
    }

    fn wake(&self, payload: &str) {
        let _ = self.wake.send(payload.to_string());
    }

    fn lock(&self) -> MutexGuard<'_, RequestQueues<R>> {
        self.queues.lock().expect("request queue lock poisoned")
    }
}

/// The incremental analysis driver.
///
/// Owns all worker state (file tracker, dependency-signature memo, summary
/// cache) and shares only the request queues with its clients. Construct it,
/// hand out [`client`](Self::client) handles, take the results stream, and
/// spawn [`run`](Self::run).
pub struct AnalysisDriver<P, Z, L, E, S>
where
    P: SyntaxParser,
    E: DiagnosticsEngine<P>,
{
    log: Arc<PerfLog>,
    options: AnalysisOptions,
    tracker: FileTracker<P>,
    summaries: SummaryCache<S, Z>,
    linker: L,
    engine: E,
    sdk: SdkBundle,
    byte_store: S,
    dependency_signatures: HashMap<SourceUri, String>,
    queues: Arc<Mutex<RequestQueues<E::Resolved>>>,
    wake_tx: mpsc::UnboundedSender<String>,
    wake_rx: mpsc::UnboundedReceiver<String>,
    results_tx: mpsc::UnboundedSender<AnalysisResult<E::Resolved>>,
    results_rx: Option<mpsc::UnboundedReceiver<AnalysisResult<E::Resolved>>>,
    status_tx: watch::Sender<AnalysisStatus>,
}

impl<P, Z, L, E, S> AnalysisDriver<P, Z, L, E, S>
where
    P: SyntaxParser,
    Z: SummarySerializer<P>,
    L: Linker,
    E: DiagnosticsEngine<P>,
    S: ByteStore + Clone,
{
    pub fn new(log: Arc<PerfLog>, host: AnalysisHost<P, Z, L, E>, byte_store: S, options: AnalysisOptions) -> Self {
        let tracker = FileTracker::new(
            host.file_system,
            host.overlay,
            host.source_factory,
            host.parser,
            options.strong_mode,
        );
        let summaries = SummaryCache::new(byte_store.clone(), host.serializer);

        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let (status_tx, _status_rx) = watch::channel(AnalysisStatus::Idle);

        Self {
            log,
            options,
            tracker,
            summaries,
            linker: host.linker,
            engine: host.engine,
            sdk: host.sdk,
            byte_store,
            dependency_signatures: HashMap::new(),
            queues: Arc::new(Mutex::new(RequestQueues::default())),
            wake_tx,
            wake_rx,
            results_tx,
            results_rx: Some(results_rx),
            status_tx,
        }
    }

    /// A new client handle onto this driver.
    pub fn client(&self) -> DriverClient<E::Resolved> {
        DriverClient {
            queues: Arc::clone(&self.queues),
            wake: self.wake_tx.clone(),
            known_files: self.tracker.known_files_handle(),
        }
    }

    /// The results stream. There is a single consumer: the first call yields
    /// the receiver, later calls yield `None`. Dropping the receiver shuts
    /// the driver down after the step in progress.
    pub fn take_results(&mut self) -> Option<mpsc::UnboundedReceiver<AnalysisResult<E::Resolved>>> {
        self.results_rx.take()
    }

    /// Subscribes to the analyzing/idle status.
    pub fn subscribe_status(&self) -> watch::Receiver<AnalysisStatus> {
        self.status_tx.subscribe()
    }

    /// The driver's main loop. Blocks on the wake channel, services the
    /// queues until they drain, goes idle, and repeats; runs until the
    /// results consumer disappears.
    pub async fn run(mut self) {
        tracing::debug!("Analysis driver loop started");

        while let Some(payload) = self.wake_rx.recv().await {
            tracing::trace!("Driver woken: {payload}");
            if self.results_tx.is_closed() {
                break;
            }

            loop {
                self.verify_changed_files();

                let Some(path) = self.next_file() else {
                    break;
                };

                self.set_status(AnalysisStatus::Analyzing);
                if !self.analyze_and_deliver(&path) {
                    self.shut_down();
                    return;
                }

                // Wake payloads received while working are advisory; the
                // queues are re-inspected every iteration anyway.
                while self.wake_rx.try_recv().is_ok() {}
            }

            self.set_status(AnalysisStatus::Idle);
        }

        self.shut_down();
    }

    /// Re-verifies the api signature of every file scheduled for
    /// verification.
    ///
    /// A file whose api signature moved invalidates the world: the entire
    /// dependency-signature memo is dropped and every explicit file is
    /// re-enqueued. Coarse, but sound. Files with no previously stored
    /// summary have contributed to no memoized signature and verify clean.
    fn verify_changed_files(&mut self) {
        let to_verify: Vec<SourcePath> = {
            let mut queues = self.lock_queues();
            if queues.files_to_verify.is_empty() {
                return;
            }

            queues.files_to_verify.drain(..).collect()
        };

        let log = Arc::clone(&self.log);
        let invalidated = log.run("verify changed files", || {
            for path in &to_verify {
                let previous =
                    self.tracker.cached_hash(path).and_then(|hash| self.summaries.get_current_unlinked(&hash));

                // Force a fresh read, rehash, and re-summarization.
                self.tracker.forget_hash(path);
                let handle = self.tracker.handle(path.clone());
                let current = self.summaries.get_unlinked(&handle);

                let Some(previous) = previous else {
                    continue;
                };

                if previous.api_signature != current.api_signature {
                    tracing::debug!("API signature of '{path}' changed, invalidating dependency signatures");
                    return true;
                }
            }

            false
        });

        if invalidated {
            self.dependency_signatures.clear();

            let mut queues = self.lock_queues();
            let explicit: Vec<SourcePath> = queues.explicit_files.iter().cloned().collect();
            for path in explicit {
                queues.files_to_analyze.insert(path);
            }
        }
    }

    /// Picks the next path to analyze: requested files first, then pending
    /// priority files, then queue order.
    fn next_file(&self) -> Option<SourcePath> {
        let mut queues = self.lock_queues();

        if let Some(path) = queues.requested_files.keys().next().cloned() {
            queues.files_to_analyze.shift_remove(&path);
            return Some(path);
        }

        let priority = queues.priority_files.clone();
        for path in priority {
            if queues.files_to_analyze.shift_remove(&path) {
                return Some(path);
            }
        }

        queues.files_to_analyze.shift_remove_index(0)
    }

    /// Analyzes `path` and delivers the outcome. Returns `false` when the
    /// results consumer is gone and the driver should shut down.
    fn analyze_and_deliver(&mut self, path: &SourcePath) -> bool {
        let log = Arc::clone(&self.log);
        let outcome = log.run("analyze file", || self.analyze(path));

        match outcome {
            Ok(result) => self.deliver(path, result),
            Err(error) => {
                tracing::error!("Analysis of '{path}' failed: {error}");

                let waiters = self.lock_queues().requested_files.remove(path).unwrap_or_default();
                for waiter in waiters {
                    let _ = waiter.send(Err(DriverError::Internal(error.to_string())));
                }

                true
            }
        }
    }

    /// Produces the analysis result for one file.
    fn analyze(&mut self, path: &SourcePath) -> Result<AnalysisResult<E::Resolved>, LinkError> {
        let file = self.tracker.handle(path.clone());
        let ctx = create_library_context(
            &file,
            &self.summaries,
            &self.byte_store,
            &self.linker,
            &self.sdk,
            &mut self.dependency_signatures,
            self.options.strong_mode,
            &self.log,
        )?;

        let content = file.content();
        let content_hash = file.content_hash();
        let errors_key = keys::errors_key(&ctx.dependency_signature, &content_hash);

        if let Some(bytes) = self.byte_store.get(&errors_key) {
            match decode_errors(&bytes) {
                Ok(errors) => {
                    tracing::debug!("Serving cached diagnostics for '{path}'");

                    return Ok(AnalysisResult {
                        path: path.clone(),
                        uri: file.uri().clone(),
                        content,
                        content_hash,
                        unit: None,
                        errors,
                    });
                }
                Err(error) => {
                    tracing::warn!("Malformed diagnostics under '{errors_key}', recomputing: {error}");
                }
            }
        }

        let log = Arc::clone(&self.log);
        let output =
            log.run("compute diagnostics", || self.engine.analyze(&file, &ctx.store, &self.sdk, &self.options));

        let errors: Vec<String> =
            output.diagnostics.iter().filter(|diagnostic| !diagnostic.is_todo()).map(|d| d.render()).collect();

        match encode_errors(&errors) {
            Ok(bytes) => self.byte_store.put(&errors_key, bytes),
            Err(error) => {
                tracing::warn!("Failed to encode diagnostics under '{errors_key}': {error}");
            }
        }

        Ok(AnalysisResult {
            path: path.clone(),
            uri: file.uri().clone(),
            content,
            content_hash,
            unit: Some(Arc::new(output.resolved)),
            errors,
        })
    }

    /// Resolves pending request promises for `path` and emits on the stream.
    fn deliver(&mut self, path: &SourcePath, result: AnalysisResult<E::Resolved>) -> bool {
        let waiters = self.lock_queues().requested_files.remove(path).unwrap_or_default();
        for waiter in waiters {
            let _ = waiter.send(Ok(result.clone()));
        }

        self.results_tx.send(result).is_ok()
    }

    fn shut_down(&mut self) {
        tracing::debug!("Analysis driver shutting down");

        let pending = {
            let mut queues = self.lock_queues();
            queues.shut_down = true;
            std::mem::take(&mut queues.requested_files)
        };

        for (_path, waiters) in pending {
            for waiter in waiters {
                let _ = waiter.send(Err(DriverError::ShutDown));
            }
        }

        self.set_status(AnalysisStatus::Idle);
    }

    fn set_status(&self, status: AnalysisStatus) {
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    fn lock_queues(&self) -> MutexGuard<'_, RequestQueues<E::Resolved>> {
        self.queues.lock().expect("request queue lock poisoned")
    }
}
