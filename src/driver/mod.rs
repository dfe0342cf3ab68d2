//! Execution driver
//!
//! Pulls tests from each source in order, runs them sequentially or on a
//! fixed pool of workers, and hands every result to a [`ResultSink`]. The
//! sink and the counters sit behind one lock; every sink write happens
//! while holding it.
//!
//! Stop conditions (interrupt, failure threshold, test limit, a fatal error
//! in another worker) are checked between tests only. Tests already running
//! are never cut short by them.

pub mod archive;
pub mod console;

use crate::config::types::{Result, RunResult, TestboxError};
use crate::core::supervisor::ProcessSupervisor;
use crate::exec::runner::Runner;
use crate::provider::{ProviderSpec, Test};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

/// Counters shared by all workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Tests that finished, whatever their verdict
    pub done: usize,
    /// Finished tests with a failing verdict
    pub errors: usize,
}

/// One finished test, as seen by a sink
pub struct TestReport<'a> {
    pub test: &'a Test,
    pub result: &'a RunResult,
    pub runner: &'a Runner,
    /// Counters including this test
    pub stats: RunStats,
}

/// Destination for finished tests.
///
/// Calls are serialized by the driver; implementations need no locking of
/// their own.
pub trait ResultSink: Send {
    /// A new source is about to be read.
    fn begin_source(&mut self, _spec: &ProviderSpec) -> Result<()> {
        Ok(())
    }

    fn record(&mut self, report: &TestReport<'_>) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverOptions {
    /// Worker count; 1 runs everything on the calling thread
    pub threads: usize,
    /// Stop dispatching once this many tests failed
    pub break_after: Option<usize>,
    /// Dispatch at most this many tests in total
    pub tests_limit: Option<usize>,
    /// Skip tests whose name does not contain this
    pub keyword: Option<String>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            break_after: None,
            tests_limit: None,
            keyword: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Interrupted,
    Aborted,
    FailureLimit,
    TestsLimit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::Interrupted => "interrupted",
            StopReason::Aborted => "aborted after a fatal error",
            StopReason::FailureLimit => "failure limit reached",
            StopReason::TestsLimit => "tests limit reached",
        })
    }
}

struct DriverState<S> {
    sink: S,
    stats: RunStats,
}

pub struct Driver<S: ResultSink> {
    runner: Runner,
    supervisor: Arc<ProcessSupervisor>,
    options: DriverOptions,
    interrupted: Arc<AtomicBool>,
    aborted: AtomicBool,
    dispatched: AtomicUsize,
    state: Mutex<DriverState<S>>,
}

impl<S: ResultSink> Driver<S> {
    pub fn new(
        runner: Runner,
        supervisor: Arc<ProcessSupervisor>,
        sink: S,
        options: DriverOptions,
    ) -> Self {
        Self {
            runner,
            supervisor,
            options,
            interrupted: Arc::new(AtomicBool::new(false)),
            aborted: AtomicBool::new(false),
            dispatched: AtomicUsize::new(0),
            state: Mutex::new(DriverState {
                sink,
                stats: RunStats::default(),
            }),
        }
    }

    /// Flag that stops dispatching when set (from a signal handler, say).
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    /// Share an interrupt flag owned elsewhere.
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = flag;
        self
    }

    pub fn stats(&self) -> Result<RunStats> {
        Ok(self.lock_state()?.stats)
    }

    /// Number of tests handed to a worker so far.
    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::SeqCst)
    }

    pub fn into_sink(self) -> S {
        let state = self
            .state
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.sink
    }

    /// Run every source in order.
    ///
    /// All sources are checked before the first test runs. A fatal error
    /// (a generator that crashed, a sink that cannot write) stops the whole
    /// run and is returned once in-flight tests have finished.
    pub fn run(&self, specs: &[ProviderSpec]) -> Result<RunStats> {
        for spec in specs {
            spec.verify()?;
        }

        for spec in specs {
            if let Some(reason) = self.stop_reason()? {
                log::info!("not opening {}: {}", spec, reason);
                break;
            }

            let provider = spec.open(&self.supervisor)?;
            self.lock_state()?.sink.begin_source(spec)?;
            log::info!("processing tests from {}", spec);

            if self.options.threads <= 1 {
                self.run_sequential(provider.tests())?;
            } else {
                self.run_parallel(provider.tests())?;
            }
        }

        self.stats()
    }

    fn run_sequential(&self, tests: impl Iterator<Item = Test>) -> Result<()> {
        for test in tests {
            if let Some(reason) = self.stop_reason()? {
                log::info!("stopping: {}", reason);
                break;
            }
            if !self.selected(&test) {
                continue;
            }

            self.dispatched.fetch_add(1, Ordering::SeqCst);
            if let Err(err) = self.execute(&test) {
                self.aborted.store(true, Ordering::SeqCst);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Dispatch over a rendezvous channel so a test is only pulled from the
    /// source once some worker is free to take it.
    fn run_parallel(&self, tests: impl Iterator<Item = Test>) -> Result<()> {
        let failure: Mutex<Option<TestboxError>> = Mutex::new(None);
        let record_failure = |err: TestboxError| {
            self.aborted.store(true, Ordering::SeqCst);
            let mut slot = failure
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            slot.get_or_insert(err);
        };

        thread::scope(|scope| {
            let (sender, receiver) = crossbeam_channel::bounded::<Test>(0);

            for worker in 0..self.options.threads {
                let receiver = receiver.clone();
                let record_failure = &record_failure;
                scope.spawn(move || {
                    for test in receiver.iter() {
                        match self.halted() {
                            Ok(None) => {}
                            Ok(Some(reason)) => {
                                log::debug!("worker {} dropping {}: {}", worker, test.name(), reason);
                                break;
                            }
                            Err(err) => {
                                record_failure(err);
                                break;
                            }
                        }
                        if let Err(err) = self.execute(&test) {
                            record_failure(err);
                            break;
                        }
                    }
                    log::trace!("worker {} finished", worker);
                });
            }
            drop(receiver);

            for test in tests {
                match self.stop_reason() {
                    Ok(None) => {}
                    Ok(Some(reason)) => {
                        log::info!("stopping: {}", reason);
                        break;
                    }
                    Err(err) => {
                        record_failure(err);
                        break;
                    }
                }
                if !self.selected(&test) {
                    continue;
                }

                self.dispatched.fetch_add(1, Ordering::SeqCst);
                if sender.send(test).is_err() {
                    // every worker has quit
                    break;
                }
            }
            drop(sender);
        });

        match failure
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn selected(&self, test: &Test) -> bool {
        self.options
            .keyword
            .as_deref()
            .map_or(true, |keyword| test.name().contains(keyword))
    }

    /// Conditions that also stop a worker from starting a test it already
    /// received.
    fn halted(&self) -> Result<Option<StopReason>> {
        if self.interrupted.load(Ordering::SeqCst) {
            return Ok(Some(StopReason::Interrupted));
        }
        if self.aborted.load(Ordering::SeqCst) {
            return Ok(Some(StopReason::Aborted));
        }
        if let Some(limit) = self.options.break_after {
            if self.lock_state()?.stats.errors >= limit {
                return Ok(Some(StopReason::FailureLimit));
            }
        }
        Ok(None)
    }

    fn stop_reason(&self) -> Result<Option<StopReason>> {
        if let Some(reason) = self.halted()? {
            return Ok(Some(reason));
        }
        match self.options.tests_limit {
            Some(limit) if self.dispatched() >= limit => Ok(Some(StopReason::TestsLimit)),
            _ => Ok(None),
        }
    }

    fn execute(&self, test: &Test) -> Result<()> {
        let result = self.runner.run(test)?;

        let mut state = self.lock_state()?;
        state.stats.done += 1;
        if result.verdict.is_failure() {
            state.stats.errors += 1;
        }
        let report = TestReport {
            test,
            result: &result,
            runner: &self.runner,
            stats: state.stats,
        };
        state.sink.record(&report)
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, DriverState<S>>> {
        self.state
            .lock()
            .map_err(|_| TestboxError::Process("driver state lock poisoned".to_string()))
    }
}
