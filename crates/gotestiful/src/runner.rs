// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Subprocess execution with streamed, decoded stdout
//!
//! [`run_streaming`] starts a program, decodes its stdout incrementally with a
//! [`RecordDecoder`] and sends each record on a bounded channel as soon as it
//! is complete. The send waits while the channel is full, so a slow consumer
//! slows the reader down instead of growing a queue. Raw stdout bytes are
//! copied to a sink before decoding.

use std::io;
use std::marker::PhantomData;
use std::process::{ExitStatus, Stdio};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const READ_CHUNK: usize = 8 * 1024;

/// Errors from running a subprocess
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The program could not be started
    #[error("Failed to start {program}: {source}")]
    Spawn {
        /// Program name
        program: String,
        /// Underlying error
        source: io::Error,
    },

    /// Reading, writing or waiting failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Stdout was not the expected stream of JSON values
    #[error("Failed to decode output: {0}")]
    Decode(#[from] serde_json::Error),

    /// The program ended unsuccessfully
    #[error("{program} exited with {status}")]
    ExitStatus {
        /// Program name
        program: String,
        /// Exit status
        status: ExitStatus,
    },
}

// ============================================================================
// Decoders
// ============================================================================

/// Incremental decoder turning stdout chunks into records
pub trait RecordDecoder {
    /// Decoded record type
    type Record: Send + 'static;

    /// Consume `chunk`, appending every record it completes to `out`
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::Decode` when the bytes cannot be decoded.
    fn decode(&mut self, chunk: &[u8], out: &mut Vec<Self::Record>) -> Result<(), RunnerError>;

    /// Flush whatever is buffered once stdout is closed
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::Decode` when the remainder is an incomplete record.
    fn finish(&mut self, out: &mut Vec<Self::Record>) -> Result<(), RunnerError>;
}

/// Decoder for a stream of concatenated JSON values
///
/// Values may be separated by any whitespace and may span several lines, which
/// covers both `go test -json` (one event per line) and `go list -json`
/// (pretty-printed objects). An incomplete trailing value is kept until more
/// bytes arrive.
pub struct JsonDecoder<T> {
    buf: Vec<u8>,
    _record: PhantomData<fn() -> T>,
}

impl<T> JsonDecoder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            _record: PhantomData,
        }
    }
}

impl<T> Default for JsonDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RecordDecoder for JsonDecoder<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Record = T;

    fn decode(&mut self, chunk: &[u8], out: &mut Vec<T>) -> Result<(), RunnerError> {
        self.buf.extend_from_slice(chunk);

        let mut stream = serde_json::Deserializer::from_slice(&self.buf).into_iter::<T>();
        let mut consumed = 0;
        loop {
            match stream.next() {
                Some(Ok(record)) => {
                    out.push(record);
                    consumed = stream.byte_offset();
                }
                Some(Err(e)) if e.is_eof() => break,
                Some(Err(e)) => return Err(RunnerError::Decode(e)),
                None => {
                    consumed = stream.byte_offset();
                    break;
                }
            }
        }

        self.buf.drain(..consumed);
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<T>) -> Result<(), RunnerError> {
        let rest = std::mem::take(&mut self.buf);
        for record in serde_json::Deserializer::from_slice(&rest).into_iter::<T>() {
            out.push(record?);
        }
        Ok(())
    }
}

/// Decoder for newline-delimited text; `\r\n` endings are accepted
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn line(bytes: &[u8]) -> String {
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        String::from_utf8_lossy(bytes).into_owned()
    }
}

impl RecordDecoder for LineDecoder {
    type Record = String;

    fn decode(&mut self, chunk: &[u8], out: &mut Vec<String>) -> Result<(), RunnerError> {
        self.buf.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(pos) = self.buf[start..].iter().position(|&b| b == b'\n') {
            out.push(Self::line(&self.buf[start..start + pos]));
            start += pos + 1;
        }
        self.buf.drain(..start);
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<String>) -> Result<(), RunnerError> {
        if !self.buf.is_empty() {
            out.push(Self::line(&self.buf));
            self.buf.clear();
        }
        Ok(())
    }
}

// ============================================================================
// Execution
// ============================================================================

fn spawn(program: &str, args: &[String], stderr: Stdio) -> Result<Child, RunnerError> {
    debug!(program, args = ?args, "starting subprocess");
    Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(stderr)
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| RunnerError::Spawn {
            program: program.to_string(),
            source,
        })
}

/// Write `input` to the child's stdin in the background, then close it
fn feed_stdin(child: &mut Child, input: &[u8]) -> Option<JoinHandle<io::Result<()>>> {
    let mut stdin = child.stdin.take()?;
    let input = input.to_vec();
    Some(tokio::spawn(async move {
        stdin.write_all(&input).await?;
        stdin.shutdown().await
    }))
}

async fn join_stdin(writer: Option<JoinHandle<io::Result<()>>>) -> Result<(), RunnerError> {
    let Some(writer) = writer else {
        return Ok(());
    };
    match writer.await.map_err(io::Error::other)? {
        Ok(()) => Ok(()),
        // the program finished without reading all of its input
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!("subprocess closed stdin early");
            Ok(())
        }
        Err(e) => Err(RunnerError::Io(e)),
    }
}

fn check_status(program: &str, status: ExitStatus) -> Result<(), RunnerError> {
    if status.success() {
        Ok(())
    } else {
        Err(RunnerError::ExitStatus {
            program: program.to_string(),
            status,
        })
    }
}

/// Run `program`, streaming its decoded stdout records into `tx`
///
/// Stderr is inherited. Every stdout chunk is written to `sink` before it is
/// decoded. `tx` is dropped once stdout is exhausted, which closes the channel
/// for the consumer, and the function then waits for the program to exit.
///
/// # Errors
///
/// - `RunnerError::Spawn` if the program cannot be started
/// - `RunnerError::Decode` on malformed output, including an incomplete record
///   at the end of stdout
/// - `RunnerError::ExitStatus` if the program exits unsuccessfully
/// - `RunnerError::Io` for pipe or sink failures
pub async fn run_streaming<D, W>(
    program: &str,
    args: &[String],
    stdin: &[u8],
    mut decoder: D,
    tx: mpsc::Sender<D::Record>,
    sink: &mut W,
) -> Result<(), RunnerError>
where
    D: RecordDecoder,
    W: AsyncWrite + Unpin,
{
    let mut child = spawn(program, args, Stdio::inherit())?;
    let writer = feed_stdin(&mut child, stdin);
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("subprocess stdout not captured"))?;

    pump(&mut stdout, &mut decoder, &tx, sink).await?;
    drop(tx);

    join_stdin(writer).await?;
    let status = child.wait().await?;
    debug!(program, %status, "subprocess finished");
    check_status(program, status)
}

/// Read `stdout` to the end, forwarding decoded records in order
async fn pump<D, R, W>(
    stdout: &mut R,
    decoder: &mut D,
    tx: &mpsc::Sender<D::Record>,
    sink: &mut W,
) -> Result<(), RunnerError>
where
    D: RecordDecoder,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut records = Vec::new();
    let mut consumer_alive = true;

    loop {
        let n = stdout.read(&mut chunk).await?;
        if n == 0 {
            decoder.finish(&mut records)?;
        } else {
            sink.write_all(&chunk[..n]).await?;
            decoder.decode(&chunk[..n], &mut records)?;
        }

        for record in records.drain(..) {
            if consumer_alive && tx.send(record).await.is_err() {
                warn!("record consumer stopped early, discarding remaining output");
                consumer_alive = false;
            }
        }

        if n == 0 {
            break;
        }
    }

    sink.flush().await?;
    Ok(())
}

/// Run `program` to completion and return its stdout
///
/// # Errors
///
/// Returns `RunnerError::Spawn` if the program cannot be started, or
/// `RunnerError::ExitStatus` (after logging its stderr) if it fails.
pub async fn run_command(
    program: &str,
    args: &[String],
    stdin: &[u8],
) -> Result<String, RunnerError> {
    let mut child = spawn(program, args, Stdio::piped())?;
    let writer = feed_stdin(&mut child, stdin);
    let output = child.wait_with_output().await?;
    join_stdin(writer).await?;

    if !output.status.success() {
        warn!(
            program,
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr).trim_end(),
            "command failed"
        );
    }
    check_status(program, output.status)?;

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
