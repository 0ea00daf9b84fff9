//! Subprocess code executor.
//!
//! One Python interpreter is kept alive per executor and every snippet runs
//! in the same top-level namespace, so variables carry over between
//! snippets. Snippets are sent length-prefixed on stdin; the interpreter
//! answers each with one sentinel-tagged JSON line on stdout. A timeout or a
//! dead interpreter drops the session and the next snippet starts a fresh
//! one. There is no sandbox: the code runs with the permissions of the
//! current process.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use codeact_core::error::ToolError;
use codeact_core::tool::{CodeExecutor, EXECUTE_TOOL_NAME, ExecutionResult};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Prefix of the reply line that ends each snippet's output.
const REPLY_SENTINEL: &str = "\u{1e}codeact-reply:";

/// Read-eval loop run inside the interpreter. `sys.argv[1]` is the sentinel.
const DRIVER: &str = r#"
import contextlib, io, json, sys, traceback

sentinel = sys.argv[1]
namespace = {"__name__": "__main__", "__builtins__": __builtins__}
reply = sys.stdout

while True:
    header = sys.stdin.buffer.readline()
    if not header:
        break
    code = sys.stdin.buffer.read(int(header)).decode("utf-8", "replace")
    out, err = io.StringIO(), io.StringIO()
    exit_code = 0
    with contextlib.redirect_stdout(out), contextlib.redirect_stderr(err):
        try:
            exec(compile(code, "<execute>", "exec"), namespace)
        except SystemExit as e:
            if e.code is None:
                exit_code = 0
            elif isinstance(e.code, int):
                exit_code = e.code
            else:
                print(e.code, file=sys.stderr)
                exit_code = 1
        except BaseException as e:
            traceback.print_exception(type(e), e, e.__traceback__.tb_next)
            exit_code = 1
    reply.write(sentinel + json.dumps({"stdout": out.getvalue(), "stderr": err.getvalue(), "exit_code": exit_code}) + "\n")
    reply.flush()
"#;

pub struct PythonExecutor {
    interpreter: String,
    timeout: Duration,
    working_dir: Option<PathBuf>,
    session: Mutex<Option<Session>>,
}

impl PythonExecutor {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout: Duration::from_secs(30),
            working_dir: None,
            session: Mutex::new(None),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    fn failed(&self, reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: EXECUTE_TOOL_NAME.into(),
            reason: reason.into(),
        }
    }

    fn spawn(&self) -> Result<Session, ToolError> {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg("-u")
            .arg("-c")
            .arg(DRIVER)
            .arg(REPLY_SENTINEL)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        debug!(interpreter = %self.interpreter, "Starting interpreter session");
        let mut child = cmd
            .spawn()
            .map_err(|e| self.failed(format!("Failed to start {}: {e}", self.interpreter)))?;
        let stdin = child.stdin.take().ok_or_else(|| self.failed("interpreter stdin unavailable"))?;
        let stdout = child.stdout.take().ok_or_else(|| self.failed("interpreter stdout unavailable"))?;

        Ok(Session {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }
}

impl Default for PythonExecutor {
    fn default() -> Self {
        Self::new("python3")
    }
}

impl std::fmt::Debug for PythonExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PythonExecutor")
            .field("interpreter", &self.interpreter)
            .field("timeout", &self.timeout)
            .field("working_dir", &self.working_dir)
            .finish()
    }
}

/// A live interpreter. Dropping it kills the process.
struct Session {
    _child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

struct Reply {
    stdout: String,
    stderr: String,
    exit_code: i64,
}

impl Session {
    async fn run(&mut self, code: &str) -> std::io::Result<Reply> {
        self.stdin.write_all(format!("{}\n", code.len()).as_bytes()).await?;
        self.stdin.write_all(code.as_bytes()).await?;
        self.stdin.flush().await?;

        // Output of child processes bypasses the driver's redirect.
        let mut stray = String::new();
        let mut line = String::new();
        loop {
            line.clear();
            if self.stdout.read_line(&mut line).await? == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "interpreter exited before replying",
                ));
            }
            let Some(payload) = line.strip_prefix(REPLY_SENTINEL) else {
                stray.push_str(&line);
                continue;
            };

            let reply: Value = serde_json::from_str(payload.trim_end()).map_err(std::io::Error::other)?;
            let field = |name: &str| reply.get(name).and_then(Value::as_str).unwrap_or_default().to_string();
            return Ok(Reply {
                stdout: stray + &field("stdout"),
                stderr: field("stderr"),
                exit_code: reply.get("exit_code").and_then(Value::as_i64).unwrap_or(-1),
            });
        }
    }
}

#[async_trait]
impl CodeExecutor for PythonExecutor {
    async fn execute(&self, code: &str) -> Result<ExecutionResult, ToolError> {
        let mut slot = self.session.lock().await;
        let mut session = match slot.take() {
            Some(session) => session,
            None => self.spawn()?,
        };

        debug!(interpreter = %self.interpreter, bytes = code.len(), "Running snippet");
        let outcome = tokio::time::timeout(self.timeout, session.run(code)).await;
        let reply = match outcome {
            Ok(Ok(reply)) => {
                *slot = Some(session);
                reply
            }
            Ok(Err(e)) => {
                warn!(interpreter = %self.interpreter, "Interpreter session lost: {e}");
                return Err(self.failed(e.to_string()));
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Code execution timed out, interpreter state discarded"
                );
                return Err(ToolError::Timeout {
                    tool_name: EXECUTE_TOOL_NAME.into(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let Reply {
            stdout,
            stderr,
            exit_code,
        } = reply;
        let content = if exit_code == 0 {
            if stderr.trim().is_empty() {
                stdout.clone()
            } else {
                format!("{stdout}\n[stderr]: {stderr}")
            }
        } else {
            warn!(exit_code, "Code exited with failure");
            format!("[exit code: {exit_code}]\n{stdout}\n{stderr}")
        };

        Ok(ExecutionResult {
            content: content.trim().to_string(),
            raw: Some(serde_json::json!({
                "stdout": stdout,
                "stderr": stderr,
                "exit_code": exit_code,
            })),
        })
    }
}
