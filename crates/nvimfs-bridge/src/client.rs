//! Minimal msgpack-RPC client.
//!
//! The client issues one request at a time and waits for the matching
//! response. Notifications and requests coming from the editor are skipped.

use crate::codec::MsgpackCodec;
use crate::message::{Message, error_text};
use futures::{SinkExt, StreamExt};
use nvimfs_core::{Error, Result};
use rmpv::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

/// msgpack-RPC client over any byte stream.
///
/// # Examples
///
/// ```no_run
/// use nvimfs_bridge::NvimClient;
/// use tokio::net::UnixStream;
///
/// # async fn example() -> nvimfs_core::Result<()> {
/// let stream = UnixStream::connect("/tmp/nvim.sock").await.unwrap();
/// let mut client = NvimClient::new(stream, "/tmp/nvim.sock");
/// let two = client.call("nvim_eval", vec!["1+1".into()]).await?;
/// assert_eq!(two.as_u64(), Some(2));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct NvimClient<S> {
    framed: Framed<S, MsgpackCodec>,
    address: String,
    next_msgid: u32,
}

impl<S> NvimClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps a connected stream. `address` is only used in error messages.
    pub fn new(stream: S, address: impl Into<String>) -> Self {
        Self {
            framed: Framed::new(stream, MsgpackCodec::new()),
            address: address.into(),
            next_msgid: 0,
        }
    }

    /// Sends a request and waits for its response.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConnectionFailed` if the stream breaks,
    /// `Error::Protocol` on malformed frames and `Error::Remote` if the
    /// editor reports an error.
    pub async fn call(&mut self, method: &str, params: Vec<Value>) -> Result<Value> {
        let msgid = self.next_msgid;
        self.next_msgid = self.next_msgid.wrapping_add(1);

        let request = Message::Request {
            msgid,
            method: method.to_string(),
            params,
        };
        tracing::trace!(msgid, method, "sending request");
        if let Err(e) = self.framed.send(request.into_value()).await {
            return Err(self.connection_failed(e));
        }

        loop {
            let frame = match self.framed.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                    return Err(Error::Protocol {
                        message: e.to_string(),
                    });
                }
                Some(Err(e)) => return Err(self.connection_failed(e)),
                None => {
                    return Err(self.connection_failed(std::io::Error::from(
                        std::io::ErrorKind::UnexpectedEof,
                    )));
                }
            };

            match Message::from_value(frame)? {
                Message::Response {
                    msgid: id,
                    error,
                    result,
                } if id == msgid => {
                    if error.is_nil() {
                        return Ok(result);
                    }
                    return Err(Error::Remote {
                        method: method.to_string(),
                        message: error_text(&error),
                    });
                }
                other => tracing::trace!(?other, "skipping unrelated message"),
            }
        }
    }

    fn connection_failed(&self, source: std::io::Error) -> Error {
        Error::ConnectionFailed {
            address: self.address.clone(),
            source: Box::new(source),
        }
    }
}
