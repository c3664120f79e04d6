//! Engine process supervision.
//!
//! A [`Process`] owns one engine subprocess and the temporary dispatcher
//! script it runs. `open` writes the script, launches the engine and waits
//! for the dispatcher to answer; `close` kills the engine and removes the
//! script.

use crate::client::{self, RpcClient};
use crate::page::WebPage;
use crate::probe::ReadinessProbe;
use crate::shim::{SCRIPT_PREFIX, SHIM};
use phantom_core::config::PORT_ENV;
use phantom_core::{Error, ProcessConfig, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long `close` waits for the output pumps to flush after the engine died.
const PUMP_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

type SharedWriter = Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;

/// Where the engine's stdout or stderr goes.
///
/// A sink outlives a single run: every `open` of the same [`Process`] feeds
/// the same writer.
#[derive(Clone)]
pub enum OutputSink {
    /// Share the host's own stream.
    Inherit,
    /// Discard.
    Null,
    /// Copy into a writer on a background task.
    Writer(SharedWriter),
}

impl OutputSink {
    pub fn writer(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self::Writer(Arc::new(Mutex::new(Box::new(writer))))
    }
}

impl std::fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inherit => f.write_str("Inherit"),
            Self::Null => f.write_str("Null"),
            Self::Writer(_) => f.write_str("Writer"),
        }
    }
}

/// A supervised engine process.
pub struct Process {
    config: ProcessConfig,
    script_source: String,
    stdout: OutputSink,
    stderr: OutputSink,
    client: RpcClient,
    script: Option<TempPath>,
    child: Option<Child>,
    pumps: Vec<JoinHandle<()>>,
}

impl Process {
    pub fn new(config: ProcessConfig) -> Self {
        let client = RpcClient::new(config.port).with_timeout(config.request_timeout());
        Self {
            config,
            script_source: SHIM.to_string(),
            stdout: OutputSink::Inherit,
            stderr: OutputSink::Inherit,
            client,
            script: None,
            child: None,
            pumps: Vec::new(),
        }
    }

    /// Replace the dispatcher script written on `open`.
    pub fn with_script(mut self, source: impl Into<String>) -> Self {
        self.script_source = source.into();
        self
    }

    pub fn with_stdout(mut self, sink: OutputSink) -> Self {
        self.stdout = sink;
        self
    }

    pub fn with_stderr(mut self, sink: OutputSink) -> Self {
        self.stderr = sink;
        self
    }

    /// Base URL of the dispatcher. No I/O.
    pub fn url(&self) -> String {
        client::base_url(self.config.port)
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    /// Path of the dispatcher script while the process is open.
    pub fn script_path(&self) -> Option<&Path> {
        self.script.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.child.is_some()
    }

    /// Write the dispatcher script, start the engine and wait until it
    /// answers `/ping`.
    ///
    /// A readiness failure leaves the engine running; `close` still owns and
    /// cleans it up.
    pub async fn open(&mut self) -> Result<()> {
        if self.child.is_some() || self.script.is_some() {
            return Err(Error::Spawn("process is already open".to_string()));
        }
        self.config.validate()?;

        let script = write_script(&self.script_source)?;
        let bin = resolve_binary(&self.config.bin_path)?;

        info!(
            bin = %bin.display(),
            script = %script.display(),
            port = self.config.port,
            "Launching engine"
        );

        let mut command = Command::new(&bin);
        command
            .arg(&*script)
            .env(PORT_ENV, self.config.port.to_string())
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        let (stdout_writer, stdout_stdio) = split_sink(&self.stdout);
        let (stderr_writer, stderr_stdio) = split_sink(&self.stderr);
        command.stdout(stdout_stdio).stderr(stderr_stdio);

        // On spawn failure the script guard drops here and removes the file.
        let mut child = command
            .spawn()
            .map_err(|e| Error::Spawn(format!("failed to start {}: {}", bin.display(), e)))?;
        self.script = Some(script);

        if let (Some(writer), Some(out)) = (stdout_writer, child.stdout.take()) {
            self.pumps.push(pump("stdout", out, writer));
        }
        if let (Some(writer), Some(err)) = (stderr_writer, child.stderr.take()) {
            self.pumps.push(pump("stderr", err, writer));
        }

        let probe = ReadinessProbe::new(self.client.clone())
            .interval(self.config.probe_interval())
            .deadline(self.config.ready_timeout());

        let ready = tokio::select! {
            ready = probe.wait() => ready,
            status = child.wait() => Err(match status {
                Ok(status) => Error::Spawn(format!("engine exited before it was ready: {}", status)),
                Err(e) => Error::Spawn(format!("failed to watch engine: {}", e)),
            }),
        };
        self.child = Some(child);

        if let Err(e) = &ready {
            warn!(error = %e, "Engine did not become ready");
        }
        ready
    }

    /// One liveness probe against the dispatcher.
    pub async fn ping(&self) -> Result<()> {
        self.client.ping().await
    }

    pub async fn create_web_page(&self) -> Result<WebPage> {
        WebPage::create(&self.client).await
    }

    /// Kill the engine, reap it and delete the dispatcher script.
    ///
    /// Every step runs even if an earlier one fails; the first failure is
    /// returned. Calling this with nothing open, or twice, is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        let mut first_err: Option<Error> = None;

        if let Some(mut child) = self.child.take() {
            match child.try_wait() {
                Ok(Some(status)) => debug!(%status, "Engine already exited"),
                _ => match child.start_kill() {
                    Ok(()) => {
                        if let Err(e) = child.wait().await {
                            first_err.get_or_insert(Error::Teardown(format!(
                                "failed to wait for engine: {}",
                                e
                            )));
                        }
                    }
                    Err(e) => {
                        first_err.get_or_insert(Error::Teardown(format!(
                            "failed to kill engine: {}",
                            e
                        )));
                    }
                },
            }
        }

        for handle in self.pumps.drain(..) {
            if tokio::time::timeout(PUMP_DRAIN_TIMEOUT, handle).await.is_err() {
                debug!("Output pump still busy after engine exit, detaching");
            }
        }

        if let Some(script) = self.script.take() {
            let path = script.to_path_buf();
            if let Err(e) = script.close() {
                first_err.get_or_insert(Error::Teardown(format!(
                    "failed to remove {}: {}",
                    path.display(),
                    e
                )));
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => {
                debug!(port = self.config.port, "Engine closed");
                Ok(())
            }
        }
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        // Best-effort kill; the script guard removes the file on its own.
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
    }
}

/// Write the dispatcher to a fresh `phantomjs-*.js` temp file.
fn write_script(source: &str) -> Result<TempPath> {
    let mut file = tempfile::Builder::new()
        .prefix(SCRIPT_PREFIX)
        .suffix(".js")
        .tempfile()
        .map_err(|e| Error::Spawn(format!("failed to create dispatcher script: {}", e)))?;
    file.write_all(source.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| Error::Spawn(format!("failed to write dispatcher script: {}", e)))?;
    Ok(file.into_temp_path())
}

/// Resolve the engine executable. Paths are used as given, bare names are
/// looked up on `PATH`.
pub fn resolve_binary(bin_path: &str) -> Result<PathBuf> {
    let candidate = Path::new(bin_path);
    if bin_path.contains('/') || bin_path.contains('\\') {
        if candidate.exists() {
            return Ok(candidate.to_path_buf());
        }
        return Err(Error::Spawn(format!("engine binary {} does not exist", bin_path)));
    }
    which::which(bin_path)
        .map_err(|e| Error::Spawn(format!("engine binary {} not found: {}", bin_path, e)))
}

fn split_sink(sink: &OutputSink) -> (Option<SharedWriter>, Stdio) {
    match sink {
        OutputSink::Inherit => (None, Stdio::inherit()),
        OutputSink::Null => (None, Stdio::null()),
        OutputSink::Writer(writer) => (Some(writer.clone()), Stdio::piped()),
    }
}

fn pump<R>(stream: &'static str, mut from: R, to: SharedWriter) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        use tokio::io::AsyncWriteExt;
        let mut to = to.lock_owned().await;
        match tokio::io::copy(&mut from, &mut *to).await {
            Ok(bytes) => debug!(stream, bytes, "Engine output closed"),
            Err(e) => warn!(stream, error = %e, "Engine output pump failed"),
        }
        let _ = (*to).flush().await;
    })
}
