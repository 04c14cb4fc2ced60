//! Address resolution through an external addr2line-compatible tool

use crate::domain::{Address, ResolverError};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::debug;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::AddressResolver;

/// Tool used when none is given on the command line
pub const DEFAULT_RESOLVER: &str = "llvm-addr2line";

/// How often a child with a deadline is checked for exit
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// How long drain threads get to see EOF once the process group is killed
const KILL_GRACE: Duration = Duration::from_millis(500);

/// Runs `<program> [args..] -e <executable> 0x<addr>` once per lookup
///
/// The tool must print the location on stdout and exit with status 0.
/// Its output is trimmed and otherwise passed through untouched.
#[derive(Debug, Clone)]
pub struct ExternalResolver {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

impl ExternalResolver {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new(), timeout: None }
    }

    /// Extra arguments placed before `-e`, e.g. `-f -C` for function names
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Kill the tool if it runs longer than `timeout` (`None` waits forever)
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, executable: &Path, address: Address) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg("-e").arg(executable).arg(address.to_string());
        cmd
    }

    fn launch_error(&self, source: std::io::Error) -> ResolverError {
        ResolverError::Launch { program: self.program.clone(), source }
    }

    fn timeout_error(&self, timeout: Duration) -> ResolverError {
        ResolverError::Timeout { program: self.program.clone(), timeout }
    }

    /// Run `cmd` with exit and output collection both bounded by `timeout`
    ///
    /// The tool runs in its own process group so that background children
    /// holding the pipes open are killed along with it.
    fn output_with_deadline(
        &self,
        mut cmd: Command,
        timeout: Duration,
    ) -> Result<Output, ResolverError> {
        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut cmd, 0);
        let mut child = cmd.spawn().map_err(|e| self.launch_error(e))?;

        // Drain both pipes so a verbose tool can't block on a full pipe
        let (tx, rx) = bounded(2);
        let mut pending = 0;
        if let Some(pipe) = child.stdout.take() {
            drain(pipe, Stream::Stdout, tx.clone());
            pending += 1;
        }
        if let Some(pipe) = child.stderr.take() {
            drain(pipe, Stream::Stderr, tx.clone());
            pending += 1;
        }
        drop(tx);

        let deadline = Instant::now() + timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                kill(&mut child);
                reap_drains(&rx, pending);
                return Err(self.timeout_error(timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };

        let mut output = Output { status, stdout: Vec::new(), stderr: Vec::new() };
        while pending > 0 {
            match rx.recv_deadline(deadline) {
                Ok((Stream::Stdout, buf)) => output.stdout = buf,
                Ok((Stream::Stderr, buf)) => output.stderr = buf,
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    // The tool exited but something it spawned still holds a pipe
                    kill_group(&child);
                    reap_drains(&rx, pending);
                    return Err(self.timeout_error(timeout));
                }
            }
            pending -= 1;
        }
        Ok(output)
    }
}

impl AddressResolver for ExternalResolver {
    fn resolve_address(&self, executable: &Path, address: Address) -> Result<String, ResolverError> {
        let mut cmd = self.command(executable, address);
        debug!("Running {cmd:?}");

        let output = match self.timeout {
            Some(timeout) => self.output_with_deadline(cmd, timeout)?,
            None => cmd.output().map_err(|e| self.launch_error(e))?,
        };

        if !output.status.success() {
            return Err(ResolverError::ExitFailure {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let location = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if location.is_empty() {
            return Err(ResolverError::EmptyOutput { program: self.program.clone() });
        }
        Ok(location)
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R, stream: Stream, tx: Sender<(Stream, Vec<u8>)>) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        // A read error just truncates what we report
        let _ = pipe.read_to_end(&mut buf);
        // The receiver is gone if the lookup already timed out
        let _ = tx.send((stream, buf));
    });
}

/// Wait a bounded time for drain threads to hit EOF after a kill
fn reap_drains(rx: &Receiver<(Stream, Vec<u8>)>, pending: usize) {
    let grace = Instant::now() + KILL_GRACE;
    for _ in 0..pending {
        if rx.recv_deadline(grace).is_err() {
            debug!("Resolver pipe still open after kill, abandoning its reader");
            break;
        }
    }
}

fn kill(child: &mut Child) {
    kill_group(child);
    if let Err(e) = child.kill() {
        debug!("Failed to kill resolver: {e}");
    }
    let _ = child.wait();
}

/// Kill every process in the tool's process group
#[cfg(unix)]
#[allow(unsafe_code)] // kill(2) has no safe std wrapper for process groups
fn kill_group(child: &Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // SAFETY: kill() only takes integers; a negative pid targets the group
    // created for this child by `process_group(0)`
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
        debug!("Failed to kill resolver process group {pgid}");
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// Fake resolver: inside `script`, `$1` is the executable and `$2` the address
    fn sh(script: &str) -> ExternalResolver {
        ExternalResolver::new("sh").with_args(vec!["-c".to_string(), script.to_string()])
    }

    #[test]
    fn test_command_line_layout() {
        let resolver = ExternalResolver::new("llvm-addr2line")
            .with_args(vec!["-f".to_string(), "-C".to_string()]);
        let cmd = resolver.command(Path::new("ftl.elf"), Address(0x1a2b));
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(cmd.get_program(), "llvm-addr2line");
        assert_eq!(args, ["-f", "-C", "-e", "ftl.elf", "0x1a2b"]);
    }

    #[test]
    fn test_output_is_trimmed() {
        let resolver = sh(r#"printf '  kmain at %s in %s \n\n' "$2" "$1""#);
        let location = resolver.resolve_address(Path::new("ftl.elf"), Address(0x10)).unwrap();
        assert_eq!(location, "kmain at 0x10 in ftl.elf");
    }

    #[test]
    fn test_missing_tool_is_launch_error() {
        let resolver = ExternalResolver::new("/nonexistent/klogsym-resolver");
        let err = resolver.resolve_address(Path::new("ftl.elf"), Address(0x10)).unwrap_err();
        assert!(err.is_unavailable(), "{err}");
    }

    #[test]
    fn test_nonzero_exit_is_failure() {
        let err = sh("exit 1").resolve_address(Path::new("ftl.elf"), Address(0x10)).unwrap_err();
        assert!(matches!(err, ResolverError::ExitFailure { code: Some(1), .. }), "{err}");
    }

    #[test]
    fn test_blank_output_is_failure() {
        let err = sh("echo '   '").resolve_address(Path::new("ftl.elf"), Address(0x10)).unwrap_err();
        assert!(matches!(err, ResolverError::EmptyOutput { .. }), "{err}");
    }

    #[test]
    fn test_stderr_is_reported() {
        let err = sh("echo 'bad image' >&2; exit 3")
            .resolve_address(Path::new("ftl.elf"), Address(0x10))
            .unwrap_err();
        assert_eq!(err.to_string(), "`sh` exited with status 3: bad image");
    }

    #[test]
    fn test_deadline_allows_fast_tool() {
        let resolver = sh(r#"echo "$2""#).with_timeout(Some(Duration::from_secs(10)));
        let location = resolver.resolve_address(Path::new("k.elf"), Address(0xff)).unwrap();
        assert_eq!(location, "0xff");
    }

    #[test]
    fn test_deadline_kills_slow_tool() {
        let resolver = sh("exec sleep 5").with_timeout(Some(Duration::from_millis(100)));
        let started = Instant::now();
        let err = resolver.resolve_address(Path::new("k.elf"), Address(0xff)).unwrap_err();
        assert!(matches!(err, ResolverError::Timeout { .. }), "{err}");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_deadline_covers_background_children() {
        // sh exits at once but the backgrounded sleep keeps stdout open
        let resolver = sh("sleep 4 & echo ok").with_timeout(Some(Duration::from_millis(500)));
        let started = Instant::now();
        let err = resolver.resolve_address(Path::new("k.elf"), Address(0xff)).unwrap_err();
        assert!(matches!(err, ResolverError::Timeout { .. }), "{err}");
        assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
    }

    #[test]
    fn test_deadline_collects_stderr_of_failed_tool() {
        let resolver =
            sh("echo 'bad image' >&2; exit 3").with_timeout(Some(Duration::from_secs(10)));
        let err = resolver.resolve_address(Path::new("k.elf"), Address(0xff)).unwrap_err();
        assert_eq!(err.to_string(), "`sh` exited with status 3: bad image");
    }
}
