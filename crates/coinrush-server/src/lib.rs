use tokio::net::TcpListener;

pub use config::Config;
pub use state::ServerState;

mod client;
pub mod config;
mod lobby;
mod outbox;
pub mod state;
pub mod tick;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Serve every connection accepted on `listener` until the process exits.
pub async fn serve(listener: TcpListener, state: ServerState) {
    tokio::spawn(tick::run(state.clone()));

    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("Failed to accept connection: {e}");
                continue;
            }
        };

        tokio::spawn(client::handle_new_connection(state.clone(), socket, addr));
    }
}
