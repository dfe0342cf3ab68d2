use crate::config::settings::RunnerSettings;
use crate::config::types::{ProcessOutcome, Result, TestboxError};
use crate::core::interpreter::InterpreterRegistry;
use crate::core::relay::StreamRelay;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn to_process_error(prefix: &str, err: impl std::fmt::Display) -> TestboxError {
    TestboxError::Process(format!("{prefix}: {err}"))
}

/// Exit code, mapping death-by-signal to `-signal`.
fn exit_code_of(status: ExitStatus) -> Option<i32> {
    status.code().or_else(|| status.signal().map(|sig| -sig))
}

/// What the watchdog observed
struct WatchReport {
    status: ExitStatus,
    elapsed: Duration,
    killed: bool,
}

/// Spawns one child per call, relays its stdin/stdout, and enforces a
/// wall-clock deadline.
///
/// The call never returns while the child is unreaped or a relay thread is
/// still running: both relays live in a thread scope that is joined before
/// the outcome is handed back.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    interpreters: InterpreterRegistry,
    relay: StreamRelay,
    poll_interval: Duration,
    kill_grace: Duration,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::from_settings(&RunnerSettings::default())
    }
}

impl ProcessSupervisor {
    pub fn new(interpreters: InterpreterRegistry) -> Self {
        Self {
            interpreters,
            ..Self::default()
        }
    }

    pub fn from_settings(settings: &RunnerSettings) -> Self {
        Self {
            interpreters: InterpreterRegistry::from_map(&settings.interpreters),
            relay: StreamRelay::new(settings.chunk_size),
            poll_interval: settings.poll_interval(),
            kill_grace: settings.kill_grace(),
        }
    }

    pub fn interpreters(&self) -> &InterpreterRegistry {
        &self.interpreters
    }

    /// Run `command` with `input` as stdin, copying stdout into `output`.
    ///
    /// `time_limit` of `None` waits indefinitely. Spawn failures are errors;
    /// everything the child does (crash, hang, garbage) is reported through
    /// the returned [`ProcessOutcome`].
    pub fn run<R, W>(
        &self,
        command: &[String],
        input: R,
        output: &mut W,
        time_limit: Option<Duration>,
    ) -> Result<ProcessOutcome>
    where
        R: Read + Send,
        W: Write + Send + ?Sized,
    {
        let effective = self.interpreters.resolve(command)?;
        log::debug!("spawning {:?} (limit {:?})", effective, time_limit);

        let mut child = Command::new(&effective[0])
            .args(&effective[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            // Own process group: a terminal interrupt must not reach in-flight
            // runs, and the deadline kill has to reach grandchildren too.
            .process_group(0)
            .spawn()
            .map_err(|e| to_process_error(&format!("spawn({})", effective[0]), e))?;
        let started = Instant::now();

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(TestboxError::Process(
                    "child pipes were not created".to_string(),
                ));
            }
        };

        let relay = self.relay;
        let report = thread::scope(|scope| {
            let feeder = scope.spawn(move || relay.feed(input, stdin));
            let drainer = scope.spawn(move || relay.drain(stdout, output));

            let report = self.watch(&mut child, started, time_limit);
            match &report {
                // The group outlives its reaped leader while any member is
                // alive; leftovers holding stdout would stall the drain.
                Ok(watched) if !watched.killed => {
                    let _ = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL);
                }
                Ok(_) => {}
                Err(_) => {
                    self.terminate(&mut child);
                    let _ = child.wait();
                }
            }

            let fed = feeder.join();
            let drained = drainer.join();
            log::trace!("relays finished: feed={:?} drain={:?}", fed, drained);
            report
        })?;

        Ok(ProcessOutcome {
            exit_code: exit_code_of(report.status),
            elapsed: report.elapsed,
            killed: report.killed,
        })
    }

    /// Convenience wrapper collecting stdout into a fresh buffer.
    pub fn capture(
        &self,
        command: &[String],
        input: &[u8],
        time_limit: Option<Duration>,
    ) -> Result<(ProcessOutcome, Vec<u8>)> {
        let mut output = Vec::new();
        let outcome = self.run(command, input, &mut output, time_limit)?;
        Ok((outcome, output))
    }

    /// Poll liveness until exit or deadline; always returns a reaped child.
    fn watch(
        &self,
        child: &mut Child,
        started: Instant,
        time_limit: Option<Duration>,
    ) -> Result<WatchReport> {
        let deadline = time_limit.and_then(|limit| started.checked_add(limit));

        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    return Ok(WatchReport {
                        status,
                        elapsed: started.elapsed(),
                        killed: false,
                    });
                }
                Ok(None) => {
                    let now = Instant::now();
                    if deadline.map_or(false, |deadline| now >= deadline) {
                        let elapsed = now.saturating_duration_since(started);
                        log::info!(
                            "wall time limit reached after {:.3}s, terminating pid {}",
                            elapsed.as_secs_f64(),
                            child.id()
                        );
                        self.terminate(child);
                        let status = child
                            .wait()
                            .map_err(|e| to_process_error("wait(after kill)", e))?;
                        return Ok(WatchReport {
                            status,
                            elapsed,
                            killed: true,
                        });
                    }
                    thread::sleep(self.poll_interval);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(to_process_error("try_wait", e)),
            }
        }
    }

    /// SIGTERM to the child's group, a short grace period, then SIGKILL.
    fn terminate(&self, child: &mut Child) {
        let group = Pid::from_raw(child.id() as i32);

        if let Err(e) = killpg(group, Signal::SIGTERM) {
            log::debug!("group SIGTERM failed ({}), signalling child directly", e);
            let _ = child.kill();
        }

        let grace_end = Instant::now() + self.kill_grace;
        while Instant::now() < grace_end {
            match child.try_wait() {
                Ok(None) => thread::sleep(self.poll_interval),
                _ => break,
            }
        }

        // Stragglers in the group may still hold the stdout pipe open.
        let _ = killpg(group, Signal::SIGKILL);
        let _ = child.kill();
    }
}
