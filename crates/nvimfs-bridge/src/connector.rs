//! Connection seams between the bridge and an editor.
//!
//! [`Connector`] opens connections and probes liveness; [`EditorRpc`] is one
//! open connection. The bridge only talks to these traits, so the dispatcher
//! can be exercised against an in-process fake.

use crate::client::NvimClient;
use async_trait::async_trait;
use nvimfs_core::{Error, Result, RpcAddress};
use rmpv::Value;
use tokio::net::{TcpStream, UnixStream};

/// One open RPC connection to an editor session.
#[async_trait]
pub trait EditorRpc: Send {
    /// Executes an Ex command.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the editor rejects the command.
    async fn command(&mut self, command: &str) -> Result<()>;

    /// Evaluates an expression and returns its value.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the expression is invalid.
    async fn eval(&mut self, expr: &str) -> Result<Value>;
}

/// Opens connections to editor sessions.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use nvimfs_bridge::{Connector, EditorRpc};
/// use nvimfs_core::{Error, Result, RpcAddress};
///
/// #[derive(Debug)]
/// struct Offline;
///
/// #[async_trait]
/// impl Connector for Offline {
///     async fn connect(&self, address: &RpcAddress) -> Result<Box<dyn EditorRpc>> {
///         Err(Error::ConnectionFailed {
///             address: address.to_string(),
///             source: "offline".into(),
///         })
///     }
///
///     async fn is_alive(&self, _address: &RpcAddress) -> bool {
///         false
///     }
/// }
/// ```
#[async_trait]
pub trait Connector: Send + Sync + std::fmt::Debug {
    /// Opens a fresh connection.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConnectionFailed` if the address is unreachable.
    async fn connect(&self, address: &RpcAddress) -> Result<Box<dyn EditorRpc>>;

    /// Returns `true` if a backing process still answers at `address`.
    async fn is_alive(&self, address: &RpcAddress) -> bool;
}

/// Connector for real Neovim instances over Unix sockets or TCP.
#[derive(Debug, Default, Clone, Copy)]
pub struct NvimConnector;

impl NvimConnector {
    /// Creates a connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for NvimConnector {
    async fn connect(&self, address: &RpcAddress) -> Result<Box<dyn EditorRpc>> {
        let name = address.to_string();
        tracing::debug!(address = %name, "connecting to session");
        let failed = |e: std::io::Error| Error::ConnectionFailed {
            address: name.clone(),
            source: Box::new(e),
        };
        match address {
            RpcAddress::Unix(path) => {
                let stream = UnixStream::connect(path).await.map_err(failed)?;
                Ok(Box::new(NvimClient::new(stream, name.clone())))
            }
            RpcAddress::Tcp(addr) => {
                let stream = TcpStream::connect(addr).await.map_err(failed)?;
                Ok(Box::new(NvimClient::new(stream, name.clone())))
            }
        }
    }

    async fn is_alive(&self, address: &RpcAddress) -> bool {
        match address {
            RpcAddress::Unix(path) => path.exists() && UnixStream::connect(path).await.is_ok(),
            RpcAddress::Tcp(addr) => TcpStream::connect(addr).await.is_ok(),
        }
    }
}

#[async_trait]
impl<S> EditorRpc for NvimClient<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    async fn command(&mut self, command: &str) -> Result<()> {
        self.call("nvim_command", vec![Value::from(command)])
            .await
            .map(|_| ())
    }

    async fn eval(&mut self, expr: &str) -> Result<Value> {
        self.call("nvim_eval", vec![Value::from(expr)]).await
    }
}
