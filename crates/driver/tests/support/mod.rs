//! A miniature line-oriented language frontend for driving the analysis
//! driver end to end, plus instrumented collaborator wrappers that count
//! byte-store, linker, and engine activity.
//!
//! The mini-language:
//!
//! ```text
//! import "pkg:b.x";
//! export "pkg:c.x";
//! part "pkg:a_part.x";
//! class Name { ... }
//! fn name(args) { body }
//! bad some message        <- the engine reports an error for this line
//! todo some message       <- the engine reports a TODO (always filtered)
//! ```
//!
//! Declaration shape (everything before the body brace) feeds the api
//! signature; bodies do not.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use kiln_driver::AnalysisDriver;
use kiln_driver::AnalysisHost;
use kiln_driver::AnalysisOptions;
use kiln_driver::AnalysisResult;
use kiln_driver::AnalysisStatus;
use kiln_driver::Diagnostic;
use kiln_driver::DiagnosticCategory;
use kiln_driver::DiagnosticsEngine;
use kiln_driver::DriverClient;
use kiln_driver::EngineOutput;
use kiln_perf::PerfLog;
use kiln_source::FileHandle;
use kiln_source::MemoryFileSystem;
use kiln_source::NoOverlay;
use kiln_source::ResolvedSource;
use kiln_source::SourceFactory;
use kiln_source::SourcePath;
use kiln_source::SourceUri;
use kiln_source::SyntaxParser;
use kiln_source::digest;
use kiln_store::ByteStore;
use kiln_store::MemoryByteStore;
use kiln_summary::LinkError;
use kiln_summary::LinkedSummary;
use kiln_summary::Linker;
use kiln_summary::SdkBundle;
use kiln_summary::SummarySerializer;
use kiln_summary::SummaryStore;
use kiln_summary::UnlinkedSummary;

/// Routes driver logs into the test harness when `RUST_LOG` asks for them.
pub fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub struct MiniParser;

impl SyntaxParser for MiniParser {
    type Unit = String;

    fn parse(&self, _uri: &SourceUri, content: &str, _strong_mode: bool) -> String {
        content.to_string()
    }
}

pub struct MiniSerializer;

fn quoted(line: &str) -> Option<String> {
    let start = line.find('"')?;
    let rest = &line[start + 1..];
    let end = rest.find('"')?;

    Some(rest[..end].to_string())
}

impl SummarySerializer<MiniParser> for MiniSerializer {
    fn serialize_unlinked(&self, unit: &String) -> UnlinkedSummary {
        let mut imports = Vec::new();
        let mut exports = Vec::new();
        let mut parts = Vec::new();
        let mut shapes = Vec::new();

        for line in unit.lines() {
            let line = line.trim();
            if line.starts_with("import ") {
                imports.extend(quoted(line));
            } else if line.starts_with("export ") {
                exports.extend(quoted(line));
            } else if line.starts_with("part ") {
                parts.extend(quoted(line));
            } else if line.starts_with("class ") || line.starts_with("fn ") {
                shapes.push(line.split('{').next().unwrap_or(line).trim().to_string());
            }
        }

        UnlinkedSummary {
            api_signature: digest::md5_hex(shapes.iter().map(|shape| shape.as_bytes())),
            imports,
            exports,
            parts,
            declarations: unit.as_bytes().to_vec(),
        }
    }
}

/// Resolves `pkg:NAME` to `/work/NAME`.
pub struct PkgFactory;

impl SourceFactory for PkgFactory {
    fn resolve_uri(&self, _containing: Option<&SourceUri>, text: &str) -> Option<ResolvedSource> {
        let name = text.strip_prefix("pkg:")?;
        Some(ResolvedSource { path: SourcePath::new(format!("/work/{name}")), uri: SourceUri::new(text) })
    }

    fn restore_uri(&self, path: &SourcePath) -> Option<SourceUri> {
        path.as_str().strip_prefix("/work/").map(|name| SourceUri::new(format!("pkg:{name}")))
    }
}

/// A linker that checks store consistency, counts invocations, and refuses
/// any library declaring `linkfail`.
#[derive(Clone, Default)]
pub struct CountingLinker {
    pub calls: Arc<AtomicUsize>,
}

impl Linker for CountingLinker {
    fn link(
        &self,
        roots: &[SourceUri],
        store: &SummaryStore,
        _sdk: &SdkBundle,
        _strong_mode: bool,
    ) -> Result<Vec<(SourceUri, LinkedSummary)>, LinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut linked = Vec::new();
        for root in roots {
            let summary = store.unlinked(root).ok_or_else(|| LinkError::MissingUnlinked(root.clone()))?;
            if summary.declarations.windows(b"linkfail".len()).any(|window| window == b"linkfail") {
                return Err(LinkError::Internal(format!("refusing to link '{root}'")));
            }

            linked.push((root.clone(), LinkedSummary { payload: format!("linked:{root}").into_bytes() }));
        }

        Ok(linked)
    }
}

/// The resolved tree the engine produces: just enough to assert identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUnit {
    pub uri: String,
    pub content: String,
}

/// An engine that reports `bad` lines as errors and `todo` lines as
/// TODO-category diagnostics, counting invocations. An optional delay keeps
/// the driver observably in the analyzing state for status tests.
#[derive(Clone, Default)]
pub struct CountingEngine {
    pub calls: Arc<AtomicUsize>,
    pub delay_ms: Arc<AtomicUsize>,
}

impl DiagnosticsEngine<MiniParser> for CountingEngine {
    type Resolved = ResolvedUnit;

    fn analyze(
        &self,
        file: &FileHandle<'_, MiniParser>,
        _store: &SummaryStore,
        _sdk: &SdkBundle,
        _options: &AnalysisOptions,
    ) -> EngineOutput<ResolvedUnit> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay_ms = self.delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            std::thread::sleep(std::time::Duration::from_millis(delay_ms as u64));
        }

        let content = file.content();
        let mut diagnostics = Vec::new();
        let mut offset = 0u32;
        for line in content.lines() {
            let trimmed = line.trim();
            if let Some(message) = trimmed.strip_prefix("bad ") {
                diagnostics.push(Diagnostic::new(DiagnosticCategory::Error, "BAD_LINE", message, offset));
            } else if let Some(message) = trimmed.strip_prefix("todo ") {
                diagnostics.push(Diagnostic::new(DiagnosticCategory::Todo, "TODO", message, offset));
            }

            offset += line.len() as u32 + 1;
        }

        EngineOutput {
            resolved: ResolvedUnit { uri: file.uri().to_string(), content: content.to_string() },
            diagnostics,
        }
    }
}

/// A byte store wrapper recording which keys were hit, missed, and written.
#[derive(Clone)]
pub struct InstrumentedStore<S> {
    inner: S,
    pub hits: Arc<Mutex<Vec<String>>>,
    pub misses: Arc<Mutex<Vec<String>>>,
    pub puts: Arc<Mutex<Vec<String>>>,
}

impl<S> InstrumentedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            hits: Arc::new(Mutex::new(Vec::new())),
            misses: Arc::new(Mutex::new(Vec::new())),
            puts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn hits_with_suffix(&self, suffix: &str) -> usize {
        self.hits.lock().expect("hit log lock poisoned").iter().filter(|key| key.ends_with(suffix)).count()
    }

    pub fn puts_with_suffix(&self, suffix: &str) -> usize {
        self.puts.lock().expect("put log lock poisoned").iter().filter(|key| key.ends_with(suffix)).count()
    }
}

impl<S: ByteStore> ByteStore for InstrumentedStore<S> {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let value = self.inner.get(key);
        let log = if value.is_some() { &self.hits } else { &self.misses };
        log.lock().expect("store log lock poisoned").push(key.to_string());

        value
    }

    fn put(&self, key: &str, bytes: Vec<u8>) {
        self.puts.lock().expect("put log lock poisoned").push(key.to_string());
        self.inner.put(key, bytes);
    }
}

pub type MiniDriver =
    AnalysisDriver<MiniParser, MiniSerializer, CountingLinker, CountingEngine, InstrumentedStore<MemoryByteStore>>;

/// Shared collaborators for one test: the file system, the byte store, and
/// the activity counters survive driver restarts.
pub struct Fixture {
    pub fs: MemoryFileSystem,
    pub store: InstrumentedStore<MemoryByteStore>,
    pub linker_calls: Arc<AtomicUsize>,
    pub engine_calls: Arc<AtomicUsize>,
    pub engine_delay_ms: Arc<AtomicUsize>,
}

impl Fixture {
    pub fn new() -> Self {
        init_tracing();

        Self {
            fs: MemoryFileSystem::new(),
            store: InstrumentedStore::new(MemoryByteStore::new()),
            linker_calls: Arc::new(AtomicUsize::new(0)),
            engine_calls: Arc::new(AtomicUsize::new(0)),
            engine_delay_ms: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn write(&self, name: &str, content: &str) {
        self.fs.write(format!("/work/{name}"), content);
    }

    pub fn path(name: &str) -> SourcePath {
        SourcePath::new(format!("/work/{name}"))
    }

    pub fn driver(&self) -> MiniDriver {
        let host = AnalysisHost {
            parser: MiniParser,
            serializer: MiniSerializer,
            linker: CountingLinker { calls: Arc::clone(&self.linker_calls) },
            engine: CountingEngine {
                calls: Arc::clone(&self.engine_calls),
                delay_ms: Arc::clone(&self.engine_delay_ms),
            },
            file_system: Arc::new(self.fs.clone()),
            overlay: Arc::new(NoOverlay),
            source_factory: Arc::new(PkgFactory),
            sdk: SdkBundle::new(
                "sdk-0001",
                vec![(SourceUri::new("platform:core"), LinkedSummary { payload: b"core".to_vec() })],
            ),
        };

        AnalysisDriver::new(Arc::new(PerfLog::new()), host, self.store.clone(), AnalysisOptions::default())
    }

    pub fn spawn(&self) -> RunningDriver {
        let mut driver = self.driver();
        let client = driver.client();
        let results = driver.take_results().expect("results stream already taken");
        let status = driver.subscribe_status();
        let task = tokio::spawn(driver.run());

        RunningDriver { client, results, status, task }
    }

    pub fn linker_calls(&self) -> usize {
        self.linker_calls.load(Ordering::SeqCst)
    }

    pub fn engine_calls(&self) -> usize {
        self.engine_calls.load(Ordering::SeqCst)
    }
}

pub struct RunningDriver {
    pub client: DriverClient<ResolvedUnit>,
    pub results: mpsc::UnboundedReceiver<AnalysisResult<ResolvedUnit>>,
    pub status: watch::Receiver<AnalysisStatus>,
    pub task: JoinHandle<()>,
}

impl RunningDriver {
    /// Waits for the driver to finish the work triggered by preceding client
    /// calls.
    ///
    /// On a current-thread runtime the driver services an entire burst
    /// between awaits, so yielding hands it the thread and it runs the burst
    /// to completion before control returns here; the idle wait then covers
    /// the multi-thread case.
    pub async fn settle(&mut self) {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }

        self.status
            .wait_for(|status| *status == AnalysisStatus::Idle)
            .await
            .expect("driver task ended unexpectedly");
    }

    /// Drains every result currently buffered on the stream.
    pub fn drain_results(&mut self) -> Vec<AnalysisResult<ResolvedUnit>> {
        let mut drained = Vec::new();
        while let Ok(result) = self.results.try_recv() {
            drained.push(result);
        }

        drained
    }

    pub fn stop(self) {
        self.task.abort();
    }
}
