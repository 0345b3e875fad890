//! ASH demonstration server binary.

mod config;
mod handler;

pub use config::{ProtocolVariant, ServerConfig, TlsConfig};
pub use handler::Server;

use std::net::SocketAddr;
use std::sync::Arc;

use ash_core::{Ash, AshResult, Clock, SystemClock};

#[tokio::main]
async fn main() -> AshResult<()> {
    tracing_subscriber::fmt::init();

    let bind_addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:9443".to_string())
        .parse()
        .expect("invalid bind address");

    let config = ServerConfig::with_addr(bind_addr).with_variant(ProtocolVariant::V1);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine = match config.variant {
        ProtocolVariant::V1 => {
            let store = Arc::new(ash_core::new_v1_store(clock.clone()));
            Ash::new_v1(store, clock)
        }
        ProtocolVariant::V2_1 => {
            let store = Arc::new(ash_core::new_v2_1_store(clock.clone()));
            Ash::new_v2_1(store, clock, config.max_clock_skew_ms)
        }
    };

    tracing::info!("Starting ASH server on {}", bind_addr);

    let server = Server::new(config, engine)?;
    server.run().await
}
