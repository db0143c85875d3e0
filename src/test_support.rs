//! Test support utilities shared across unit and integration tests.
//!
//! Two doubles live here: [`ScriptedRunner`] stands in for the local `ssh`
//! process, and [`ScriptedConnector`] stands in for a whole remote host so
//! orchestration can be exercised without any process at all.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::env;
use std::ffi::OsString;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard};

use crate::session::{CommandOutput, CommandRunner, Connector, RemoteSession, SessionError};
use crate::target::Target;

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }

    /// Returns the final argument, which carries the remote command for
    /// `ssh` invocations.
    #[must_use]
    pub fn last_arg(&self) -> Option<String> {
        self.args
            .last()
            .map(|arg| arg.to_string_lossy().into_owned())
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Pushes a successful exit status with no output.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32, stderr: impl Into<String>) {
        self.push_output(Some(code), "", stderr);
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SessionError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| SessionError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

#[derive(Debug, Default)]
struct HostScript {
    open_failure: Option<SessionError>,
    close_failure: Option<SessionError>,
    responses: VecDeque<Result<CommandOutput, SessionError>>,
    commands: Vec<String>,
    opens: usize,
    closes: usize,
}

/// Connector double that plays a scripted remote host.
///
/// Every session it opens shares the same script and counters, so tests
/// can assert how many sessions were opened and closed and which commands
/// reached the host.
#[derive(Clone, Debug, Default)]
pub struct ScriptedConnector {
    script: Rc<RefCell<HostScript>>,
}

impl ScriptedConnector {
    /// Creates a connector whose sessions open successfully.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `open` fail with a connection error.
    pub fn refuse_connections(&self, stderr: impl Into<String>) {
        self.script.borrow_mut().open_failure = Some(SessionError::Connection {
            target: String::from("scripted"),
            status_text: String::from("255"),
            stderr: stderr.into(),
        });
    }

    /// Makes every subsequent `close` report a transport failure. The close
    /// is still counted.
    pub fn fail_closes(&self, message: impl Into<String>) {
        self.script.borrow_mut().close_failure = Some(SessionError::Spawn {
            program: String::from("ssh"),
            message: message.into(),
        });
    }

    /// Queues a command that exits zero and prints `stdout`.
    pub fn push_success(&self, stdout: impl Into<String>) {
        self.push_output(Some(0), stdout, "");
    }

    /// Queues a command that exits with `code` and writes `stderr`.
    pub fn push_failure(&self, code: i32, stderr: impl Into<String>) {
        self.push_output(Some(code), "", stderr);
    }

    /// Queues an explicit command output.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.script
            .borrow_mut()
            .responses
            .push_back(Ok(CommandOutput {
                code,
                stdout: stdout.into(),
                stderr: stderr.into(),
            }));
    }

    /// Queues a transport failure for the next command.
    pub fn push_transport_error(&self, message: impl Into<String>) {
        self.script
            .borrow_mut()
            .responses
            .push_back(Err(SessionError::Spawn {
                program: String::from("ssh"),
                message: message.into(),
            }));
    }

    /// Commands that reached the host, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.script.borrow().commands.clone()
    }

    /// Number of sessions opened successfully.
    #[must_use]
    pub fn opens(&self) -> usize {
        self.script.borrow().opens
    }

    /// Number of `close` calls across all sessions.
    #[must_use]
    pub fn closes(&self) -> usize {
        self.script.borrow().closes
    }
}

impl Connector for ScriptedConnector {
    type Session = ScriptedSession;

    fn open(&self, _target: &Target) -> Result<Self::Session, SessionError> {
        let mut script = self.script.borrow_mut();
        if let Some(ref failure) = script.open_failure {
            return Err(failure.clone());
        }
        script.opens += 1;
        Ok(ScriptedSession {
            script: Rc::clone(&self.script),
        })
    }
}

/// Session handed out by [`ScriptedConnector`].
///
/// Counts every `close` call, including repeated ones.
#[derive(Debug)]
pub struct ScriptedSession {
    script: Rc<RefCell<HostScript>>,
}

impl RemoteSession for ScriptedSession {
    fn run(&mut self, command: &str) -> Result<CommandOutput, SessionError> {
        let mut script = self.script.borrow_mut();
        script.commands.push(command.to_owned());
        script.responses.pop_front().unwrap_or_else(|| {
            Err(SessionError::Spawn {
                program: String::from("ssh"),
                message: String::from("no scripted response available"),
            })
        })
    }

    fn close(&mut self) -> Result<(), SessionError> {
        let mut script = self.script.borrow_mut();
        script.closes += 1;
        script.close_failure.clone().map_or(Ok(()), Err)
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    #[must_use]
    pub fn set_vars(pairs: &[(&str, &str)]) -> Self {
        let guard = ENV_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
