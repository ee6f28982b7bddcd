//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `SignalingServer` bindet einen TCP-Socket und startet fuer jede
//! eingehende Verbindung einen eigenen tokio-Task mit einer
//! `ClientConnection`. Das Teilnehmer-Limit wird beim Accept geprueft;
//! ist der Server voll, bekommt der Client eine SERVER_FULL-Antwort und
//! die Verbindung wird geschlossen.

use futures_util::SinkExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

use huddle_protocol::signal::SignalMessage;
use huddle_protocol::wire::FrameCodec;

use crate::connection::ClientConnection;
use crate::error::SessionError;
use crate::server_state::SignalingState;

/// TCP-Signaling-Server
///
/// Bindet einen TCP-Socket und akzeptiert Verbindungen in einer Loop.
pub struct SignalingServer {
    state: Arc<SignalingState>,
    bind_addr: SocketAddr,
}

impl SignalingServer {
    /// Erstellt einen neuen SignalingServer
    pub fn neu(state: Arc<SignalingState>, bind_addr: SocketAddr) -> Self {
        Self { state, bind_addr }
    }

    /// Startet den TCP-Listener und akzeptiert Verbindungen
    ///
    /// Laeuft bis `shutdown_rx` ein `true`-Signal empfaengt.
    pub async fn starten(
        self,
        shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.akzeptieren(listener, shutdown_rx).await
    }

    async fn akzeptieren(
        self,
        listener: TcpListener,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        let lokale_addr = listener.local_addr()?;

        tracing::info!(
            adresse = %lokale_addr,
            "TCP Signaling-Server gestartet"
        );

        loop {
            tokio::select! {
                // Neue eingehende Verbindung
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            // Teilnehmer-Limit pruefen
                            let verbunden = self.state.broadcaster.anzahl() as u32;
                            if verbunden >= self.state.config.max_teilnehmer {
                                tracing::warn!(
                                    peer = %peer_addr,
                                    max = self.state.config.max_teilnehmer,
                                    "Server voll, Verbindung abgelehnt"
                                );
                                ablehnung_senden(stream);
                                continue;
                            }

                            tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");

                            let verbindung = ClientConnection::neu(
                                Arc::clone(&self.state),
                                peer_addr,
                            );
                            let shutdown_rx_clone = shutdown_rx.clone();

                            tokio::spawn(async move {
                                verbindung.verarbeiten(stream, shutdown_rx_clone).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Signaling-Server: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!("TCP Signaling-Server gestoppt");
        Ok(())
    }

    /// Gibt die Bind-Adresse zurueck
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}

/// Schickt dem abgewiesenen Client eine SERVER_FULL-Antwort und schliesst
///
/// Laeuft in einem eigenen Task damit ein langsamer Client die
/// Accept-Schleife nicht aufhaelt. Senden ist best-effort.
fn ablehnung_senden(stream: TcpStream) {
    let fehler = SessionError::ServerVoll;
    let nachricht = SignalMessage::error(
        SignalMessage::NOTIFICATION_ID,
        fehler.fehler_code(),
        fehler.to_string(),
    );
    tokio::spawn(async move {
        let mut framed = Framed::new(stream, FrameCodec::new());
        let _ = framed.send(nachricht).await;
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
