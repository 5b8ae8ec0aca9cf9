use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument};

use crate::codec;
use crate::config::Config;
use crate::connection::Connection;
use crate::engine::Engine;
use crate::frame::Frame;
use crate::Error;

/// Builds the engine for `config` (cluster mode iff `self` and `peers` are
/// both set), binds, and serves until a shutdown signal arrives.
pub async fn run(config: Config) -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let listener = TcpListener::bind(config.listen_addr()).await?;
    let engine = Arc::new(Engine::new(&config).await?);

    info!("rudis listening on {}", listener.local_addr()?);

    serve(listener, engine).await
}

/// The accept loop, factored out of `run` so tests can drive a server on
/// an ephemeral listener.
pub async fn serve(listener: TcpListener, engine: Arc<Engine>) -> Result<(), Error> {
    let (notify_shutdown, _) = broadcast::channel::<()>(1);
    let (shutdown_complete_tx, mut shutdown_complete_rx) = mpsc::channel::<()>(1);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, client_address) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!("failed to accept connection: {}", e);
                        continue;
                    }
                };
                info!("Accepted connection from {:?}", client_address);

                let engine = engine.clone();
                let shutdown = notify_shutdown.subscribe();
                let complete = shutdown_complete_tx.clone();
                tokio::spawn(async move {
                    handle_connection(socket, client_address, engine, shutdown).await;
                    drop(complete);
                });
            }
            _ = &mut shutdown => {
                info!("shutting down...");
                break;
            }
        }
    }

    // Stop accepting, tell every handler to finish its current command,
    // then wait for them before closing the engine.
    drop(listener);
    let _ = notify_shutdown.send(());
    drop(shutdown_complete_tx);
    let _ = shutdown_complete_rx.recv().await;

    engine.close();
    Ok(())
}

#[instrument(name = "connection", skip(stream, engine, shutdown), fields(client_address = %client_address))]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    engine: Arc<Engine>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut conn = Connection::new(stream, client_address);

    loop {
        let frame = tokio::select! {
            frame = conn.read_frame() => frame,
            _ = shutdown.recv() => break,
        };

        match frame {
            Ok(Some(frame)) => {
                debug!("Received frame from client: {:?}", frame);

                // The only legal request shape is a multi-bulk array of
                // strings; anything else is dropped with a log line.
                let cmdline = match frame.into_cmdline() {
                    Some(cmdline) if !cmdline.is_empty() => cmdline,
                    Some(_) => {
                        error!("empty request");
                        continue;
                    }
                    None => {
                        error!("request must be a multi-bulk array");
                        continue;
                    }
                };

                let reply = engine.exec(&conn.state, cmdline).await;
                debug!("Sending reply to client: {}", reply);
                if conn.write_frame(&reply).await.is_err() {
                    break;
                }
            }
            // Client went away.
            Ok(None) => break,
            Err(codec::Error::Io(err)) => {
                debug!("connection error: {}", err);
                break;
            }
            // Recoverable protocol error: report it and keep serving.
            Err(codec::Error::Protocol(detail)) => {
                let reply = Frame::err(format!("ERR Protocol error: '{}'", detail));
                if conn.write_frame(&reply).await.is_err() {
                    break;
                }
            }
        }
    }

    conn.close().await;
    engine.after_client_close(&conn.state);
    info!("Connection closed");
}

/// Resolves when any of HUP, QUIT, TERM or INT arrives.
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let installed = (|| -> std::io::Result<_> {
        Ok((
            signal(SignalKind::hangup())?,
            signal(SignalKind::quit())?,
            signal(SignalKind::terminate())?,
            signal(SignalKind::interrupt())?,
        ))
    })();

    let (mut hangup, mut quit, mut terminate, mut interrupt) = match installed {
        Ok(streams) => streams,
        Err(err) => {
            error!("failed to install signal handlers: {}", err);
            // Without handlers there is nothing to wait for; the server
            // runs until the process is killed.
            std::future::pending::<()>().await;
            unreachable!()
        }
    };

    tokio::select! {
        _ = hangup.recv() => {},
        _ = quit.recv() => {},
        _ = terminate.recv() => {},
        _ = interrupt.recv() => {},
    }
}
