//! TCP/TLS connection handler for the ASH demonstration server.

use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

use ash_core::wire::{ClientMessage, IssueContextRequest, ProtectedRequest, ServerMessage};
use ash_core::{base64url_decode, Ash, AshError, AshResult};

use crate::config::ServerConfig;

/// ASH demonstration server.
pub struct Server {
    config: ServerConfig,
    engine: Arc<Ash>,
    tls_acceptor: Option<TlsAcceptor>,
}

impl Server {
    /// Create a new server.
    pub fn new(config: ServerConfig, engine: Ash) -> AshResult<Self> {
        let tls_acceptor = if let Some(ref tls_config) = config.tls {
            Some(Self::create_tls_acceptor(tls_config)?)
        } else {
            None
        };

        Ok(Self {
            config,
            engine: Arc::new(engine),
            tls_acceptor,
        })
    }

    /// Create TLS acceptor from config.
    fn create_tls_acceptor(tls_config: &crate::config::TlsConfig) -> AshResult<TlsAcceptor> {
        use rustls_pemfile::{certs, private_key};
        use std::fs::File;
        use std::io::BufReader;

        let cert_file = File::open(&tls_config.cert_path)
            .map_err(|e| AshError::Transport(format!("Failed to open cert: {}", e)))?;
        let key_file = File::open(&tls_config.key_path)
            .map_err(|e| AshError::Transport(format!("Failed to open key: {}", e)))?;

        let certs: Vec<_> = certs(&mut BufReader::new(cert_file))
            .filter_map(|r| r.ok())
            .collect();

        let key = private_key(&mut BufReader::new(key_file))
            .map_err(|e| AshError::Transport(format!("Failed to read key: {}", e)))?
            .ok_or_else(|| AshError::Transport("No private key found".to_string()))?;

        let config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| AshError::Transport(format!("TLS config error: {}", e)))?;

        Ok(TlsAcceptor::from(Arc::new(config)))
    }

    /// Run the server.
    pub async fn run(self) -> AshResult<()> {
        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .map_err(|e| AshError::Transport(format!("Failed to bind: {}", e)))?;

        tracing::info!("ASH server listening on {}", self.config.bind_addr);

        loop {
            let (stream, addr) = listener
                .accept()
                .await
                .map_err(|e| AshError::Transport(format!("Accept failed: {}", e)))?;

            tracing::debug!("Connection from {}", addr);

            let engine = Arc::clone(&self.engine);
            let config = self.config.clone();
            let tls_acceptor = self.tls_acceptor.clone();

            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, config, engine, tls_acceptor).await
                {
                    tracing::error!("Connection error from {}: {}", addr, e);
                }
            });
        }
    }

    /// Handle a single connection.
    async fn handle_connection(
        stream: TcpStream,
        config: ServerConfig,
        engine: Arc<Ash>,
        tls_acceptor: Option<TlsAcceptor>,
    ) -> AshResult<()> {
        if let Some(acceptor) = tls_acceptor {
            let tls_stream = acceptor
                .accept(stream)
                .await
                .map_err(|e| AshError::Transport(format!("TLS handshake failed: {}", e)))?;
            Self::handle_stream(tls_stream, config, engine).await
        } else {
            Self::handle_stream(stream, config, engine).await
        }
    }

    /// Handle a message stream: one length-prefixed JSON envelope per
    /// request, one per response, in order.
    async fn handle_stream<S>(mut stream: S, config: ServerConfig, engine: Arc<Ash>) -> AshResult<()>
    where
        S: AsyncReadExt + AsyncWriteExt + Unpin,
    {
        let mut len_buf = [0u8; 4];

        loop {
            match stream.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    tracing::debug!("Client disconnected");
                    break;
                }
                Err(e) => return Err(AshError::Transport(format!("Read error: {}", e))),
            }

            let len = u32::from_be_bytes(len_buf) as usize;
            if len > config.max_message_size {
                let response = ServerMessage::Error {
                    message: format!("message too large: {} > {}", len, config.max_message_size),
                };
                send_message(&mut stream, &response).await?;
                continue;
            }

            let mut msg_buf = vec![0u8; len];
            stream
                .read_exact(&mut msg_buf)
                .await
                .map_err(|e| AshError::Transport(format!("Read error: {}", e)))?;

            let response = match serde_json::from_slice::<ClientMessage>(&msg_buf) {
                Ok(message) => dispatch(&engine, &config, message).await,
                Err(e) => ServerMessage::Error {
                    message: format!("malformed envelope: {}", e),
                },
            };

            send_message(&mut stream, &response).await?;
        }

        Ok(())
    }
}

async fn dispatch(engine: &Ash, config: &ServerConfig, message: ClientMessage) -> ServerMessage {
    match message {
        ClientMessage::IssueContext(req) => handle_issue_context(engine, config, req).await,
        ClientMessage::Protected(req) => handle_protected(engine, req).await,
    }
}

async fn handle_issue_context(
    engine: &Ash,
    config: &ServerConfig,
    req: IssueContextRequest,
) -> ServerMessage {
    let ttl_ms = req.ttl_ms.unwrap_or(config.default_ttl_ms);
    let mode = req.mode.unwrap_or(config.default_mode);
    match engine
        .issue_context(&req.method, &req.path, ttl_ms, mode, req.metadata)
        .await
    {
        Ok(info) => ServerMessage::Context(info),
        Err(e) => ServerMessage::Error {
            message: e.to_string(),
        },
    }
}

async fn handle_protected(engine: &Ash, req: ProtectedRequest) -> ServerMessage {
    let payload = match base64url_decode(&req.payload_b64) {
        Ok(bytes) => bytes,
        Err(_) => {
            return ServerMessage::Error {
                message: "payload_b64 is not valid base64url".to_string(),
            }
        }
    };

    let result = engine
        .verify(
            &req.context_id,
            &req.proof,
            &req.method,
            &req.path,
            &payload,
            &req.content_type,
            req.timestamp_ms,
        )
        .await;

    ServerMessage::Verified(result)
}

/// Send a length-prefixed JSON message.
async fn send_message<S>(stream: &mut S, message: &ServerMessage) -> AshResult<()>
where
    S: AsyncWriteExt + Unpin,
{
    let json = serde_json::to_vec(message)?;
    let len = json.len() as u32;

    stream
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| AshError::Transport(format!("Write error: {}", e)))?;
    stream
        .write_all(&json)
        .await
        .map_err(|e| AshError::Transport(format!("Write error: {}", e)))?;
    stream
        .flush()
        .await
        .map_err(|e| AshError::Transport(format!("Flush error: {}", e)))?;

    Ok(())
}
