//! High level session operations.
//!
//! Every operation opens a fresh connection through the configured
//! [`Connector`] and drops it when done. Nothing is pooled, so a session
//! that restarts on the same address is picked up transparently at the cost
//! of one connect per file operation.

use crate::connector::Connector;
use crate::split::is_split_command;
use nvimfs_core::{BufferNumber, Error, Result, RpcAddress};
use rmpv::Value;
use std::path::Path;
use std::sync::Arc;

const BUFFER_LIST_EXPR: &str = "map(getbufinfo(), '[v:val.bufnr, v:val.name]')";
const CURRENT_BUFFER_EXPR: &str = "bufnr(\"%\")";

/// A buffer opened through the bridge or found during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedBuffer {
    /// Buffer number in the session
    pub number: BufferNumber,
    /// Path of the edited file
    pub name: String,
}

/// Runs session operations on top of a [`Connector`].
///
/// # Examples
///
/// ```
/// use nvimfs_bridge::{NvimConnector, RpcBridge};
/// use std::sync::Arc;
///
/// let bridge = RpcBridge::new(Arc::new(NvimConnector::new()));
/// # let _ = bridge;
/// ```
#[derive(Debug, Clone)]
pub struct RpcBridge {
    connector: Arc<dyn Connector>,
}

impl RpcBridge {
    /// Creates a bridge over `connector`.
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// Returns `true` if the backing process at `address` still answers.
    pub async fn is_alive(&self, address: &RpcAddress) -> bool {
        self.connector.is_alive(address).await
    }

    /// Executes every line of `payload` as a command, in order.
    ///
    /// Returns the number of executed commands. An empty payload does not
    /// connect at all.
    ///
    /// # Errors
    ///
    /// Returns the first connection or command failure; later lines are not
    /// executed.
    pub async fn execute_commands(&self, address: &RpcAddress, payload: &[u8]) -> Result<usize> {
        let lines = payload_lines(payload);
        if lines.is_empty() {
            return Ok(0);
        }
        let mut rpc = self.connector.connect(address).await?;
        for line in &lines {
            tracing::debug!(%address, command = %line, "executing command");
            rpc.command(line).await?;
        }
        Ok(lines.len())
    }

    /// Evaluates every line of `payload` and returns the joined results.
    ///
    /// Each result is followed by a newline. A line the editor refuses to
    /// evaluate is replaced by a diagnostic naming the expression.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be opened, breaks partway
    /// through the batch or carries a malformed message.
    pub async fn evaluate(&self, address: &RpcAddress, payload: &[u8]) -> Result<String> {
        let lines = payload_lines(payload);
        if lines.is_empty() {
            return Ok(String::new());
        }
        let mut rpc = self.connector.connect(address).await?;
        let mut output = String::new();
        for expr in &lines {
            match rpc.eval(expr).await {
                Ok(value) => output.push_str(&stringify(&value)),
                Err(e) if e.is_remote_error() => {
                    tracing::debug!(%address, expr = %expr, error = %e, "evaluation failed");
                    output.push_str(&format!("'{expr}' couldn't be evaluated"));
                }
                Err(e) => return Err(e),
            }
            output.push('\n');
        }
        Ok(output)
    }

    /// Opens every line of `payload` as a file and reports the buffers.
    ///
    /// # Errors
    ///
    /// Returns the first connection or command failure, or
    /// `Error::Protocol` if the editor reports a non-numeric buffer number.
    pub async fn open_files(
        &self,
        address: &RpcAddress,
        payload: &[u8],
    ) -> Result<Vec<OpenedBuffer>> {
        let lines = payload_lines(payload);
        if lines.is_empty() {
            return Ok(Vec::new());
        }
        let mut rpc = self.connector.connect(address).await?;
        let mut opened = Vec::with_capacity(lines.len());
        for file in lines {
            rpc.command(&format!("drop {file}")).await?;
            let number = buffer_number(&rpc.eval(CURRENT_BUFFER_EXPR).await?)?;
            tracing::debug!(%address, %file, %number, "opened file");
            opened.push(OpenedBuffer { number, name: file });
        }
        Ok(opened)
    }

    /// Executes the accepted split commands of `payload`.
    ///
    /// Lines rejected by the split filter are dropped silently. Returns the
    /// number of executed splits; when none is accepted nothing connects.
    ///
    /// # Errors
    ///
    /// Returns the first connection or command failure.
    pub async fn split_windows(&self, address: &RpcAddress, payload: &[u8]) -> Result<usize> {
        let accepted: Vec<String> = payload_lines(payload)
            .into_iter()
            .filter(|line| {
                let ok = is_split_command(line);
                if !ok {
                    tracing::debug!(%address, line = %line, "ignoring non-split command");
                }
                ok
            })
            .collect();
        if accepted.is_empty() {
            return Ok(0);
        }
        let mut rpc = self.connector.connect(address).await?;
        for line in &accepted {
            rpc.command(line).await?;
        }
        Ok(accepted.len())
    }

    /// Lists the session's buffers that are backed by real files.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be reached or answers with
    /// something other than a list of `[bufnr, name]` pairs.
    pub async fn enumerate_open_files(&self, address: &RpcAddress) -> Result<Vec<OpenedBuffer>> {
        let mut rpc = self.connector.connect(address).await?;
        let entries = match rpc.eval(BUFFER_LIST_EXPR).await? {
            Value::Array(entries) => entries,
            other => {
                return Err(Error::Protocol {
                    message: format!("unexpected buffer listing: {other}"),
                });
            }
        };

        let mut buffers = Vec::new();
        for entry in entries {
            let Value::Array(pair) = entry else {
                continue;
            };
            let (Some(number), Some(name)) = (pair.first(), pair.get(1)) else {
                continue;
            };
            let name = stringify(name);
            if Path::new(&name).is_file() {
                buffers.push(OpenedBuffer {
                    number: buffer_number(number)?,
                    name,
                });
            }
        }
        tracing::debug!(%address, count = buffers.len(), "enumerated open files");
        Ok(buffers)
    }
}

/// Splits a written payload into command lines.
///
/// The bytes are decoded as UTF-8 (invalid sequences replaced), split on
/// line breaks and trimmed; blank lines are dropped.
///
/// # Examples
///
/// ```
/// use nvimfs_bridge::payload_lines;
///
/// assert_eq!(payload_lines(b"echo 1\n\n  echo 2\r\n"), vec!["echo 1", "echo 2"]);
/// ```
#[must_use]
pub fn payload_lines(payload: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(payload)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Renders an evaluation result as text.
///
/// Strings are used as-is, binary data is decoded lossily, nil becomes
/// empty and everything else uses the msgpack display form.
///
/// # Examples
///
/// ```
/// use nvimfs_bridge::{Value, stringify};
///
/// assert_eq!(stringify(&Value::from(2)), "2");
/// assert_eq!(stringify(&Value::from("hi")), "hi");
/// assert_eq!(stringify(&Value::Binary(b"raw".to_vec())), "raw");
/// assert_eq!(stringify(&Value::Nil), "");
/// ```
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Nil => String::new(),
        Value::String(s) => s.as_str().map_or_else(
            || String::from_utf8_lossy(s.as_bytes()).into_owned(),
            str::to_string,
        ),
        Value::Binary(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        other => other.to_string(),
    }
}

fn buffer_number(value: &Value) -> Result<BufferNumber> {
    value
        .as_u64()
        .map(BufferNumber::new)
        .ok_or_else(|| Error::Protocol {
            message: format!("invalid buffer number: {value}"),
        })
}
