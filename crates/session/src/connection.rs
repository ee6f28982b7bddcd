//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task und eine frische Teilnehmer-ID. Direkt nach dem Aufbau
//! schickt der Server eine Welcome-Benachrichtigung mit der ID und der
//! Information ob bereits Produzenten live sind.
//!
//! ## Keepalive
//! - Server sendet alle `keepalive_sek` einen Ping
//! - Client muss innerhalb von `verbindungs_timeout_sek` antworten
//! - Bei Timeout wird die Verbindung getrennt

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use huddle_core::types::ParticipantId;
use huddle_protocol::signal::{ErrorCode, SignalMessage, SignalPayload, WelcomeNotification};
use huddle_protocol::wire::FrameCodec;

use crate::dispatcher::{DispatcherContext, MessageDispatcher};
use crate::server_state::SignalingState;

/// Verarbeitet eine einzelne TCP-Verbindung
///
/// Liest Frames via `FrameCodec`, dispatcht an `MessageDispatcher` und
/// sendet Antworten zurueck. Laeuft in einem eigenen tokio-Task.
pub struct ClientConnection {
    state: Arc<SignalingState>,
    peer_addr: SocketAddr,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<SignalingState>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Diese Methode laeuft bis die Verbindung getrennt wird oder ein
    /// Shutdown-Signal eingeht.
    pub async fn verarbeiten(
        self,
        stream: TcpStream,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) {
        let peer_addr = self.peer_addr;
        let keepalive_intervall = Duration::from_secs(self.state.config.keepalive_sek);
        let timeout_dauer = Duration::from_secs(self.state.config.verbindungs_timeout_sek);

        let teilnehmer = ParticipantId::new();
        tracing::info!(peer = %peer_addr, teilnehmer = %teilnehmer, "Neue Verbindung");

        // Framed-Stream mit FrameCodec einrichten
        let mut framed = Framed::new(stream, FrameCodec::new());

        // Send-Queue beim Broadcaster registrieren (Broadcaster -> TCP)
        let mut sende_rx = self.state.broadcaster.teilnehmer_registrieren(teilnehmer);

        let ctx = DispatcherContext {
            peer_addr,
            teilnehmer,
        };
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));

        // Welcome mit Teilnehmer-ID und Produzenten-Hinweis
        let welcome = SignalMessage::notification(SignalPayload::Welcome(WelcomeNotification {
            participant_id: teilnehmer,
            has_producers: self.state.produzenten.hat_produzenten(),
        }));
        if let Err(e) = framed.send(welcome).await {
            tracing::warn!(peer = %peer_addr, fehler = %e, "Welcome-Senden fehlgeschlagen");
            self.state.broadcaster.teilnehmer_entfernen(&teilnehmer);
            return;
        }

        // Zeitpunkt des letzten empfangenen Frames
        let mut letzter_empfang = Instant::now();
        // Zeitpunkt des naechsten Ping
        let mut naechster_ping = Instant::now() + keepalive_intervall;
        let mut ping_request_id: u32 = 0;

        loop {
            let jetzt = Instant::now();

            // Timeout-Pruefung
            if jetzt.duration_since(letzter_empfang) > timeout_dauer {
                tracing::warn!(peer = %peer_addr, "Verbindungs-Timeout");
                break;
            }

            // Naechsten Ping-Zeitpunkt berechnen
            let ping_verzoegerung = if jetzt < naechster_ping {
                naechster_ping.duration_since(jetzt)
            } else {
                Duration::from_millis(1)
            };

            tokio::select! {
                // Eingehende Nachricht vom Client
                frame = framed.next() => {
                    match frame {
                        Some(Ok(nachricht)) => {
                            letzter_empfang = Instant::now();
                            tracing::trace!(
                                peer = %peer_addr,
                                request_id = nachricht.request_id,
                                "Nachricht empfangen"
                            );

                            if let Some(antwort) = dispatcher.dispatch(nachricht, &ctx).await {
                                if let Err(e) = framed.send(antwort).await {
                                    tracing::warn!(
                                        peer = %peer_addr,
                                        fehler = %e,
                                        "Senden fehlgeschlagen"
                                    );
                                    break;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(
                                peer = %peer_addr,
                                fehler = %e,
                                "Frame-Lesefehler"
                            );
                            break;
                        }
                        None => {
                            // Verbindung geschlossen
                            tracing::info!(peer = %peer_addr, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                // Ausgehende Nachricht aus dem Broadcaster
                Some(ausgehend) = sende_rx.recv() => {
                    if let Err(e) = framed.send(ausgehend).await {
                        tracing::warn!(
                            peer = %peer_addr,
                            fehler = %e,
                            "Broadcast-Senden fehlgeschlagen"
                        );
                        break;
                    }
                }

                // Keepalive-Ping
                _ = tokio::time::sleep(ping_verzoegerung) => {
                    if jetzt >= naechster_ping {
                        ping_request_id = ping_request_id.wrapping_add(1);
                        let ts = std::time::SystemTime::now()
                            .duration_since(std::time::UNIX_EPOCH)
                            .unwrap_or_default()
                            .as_millis() as u64;
                        let ping = SignalMessage::ping(ping_request_id, ts);

                        if let Err(e) = framed.send(ping).await {
                            tracing::warn!(
                                peer = %peer_addr,
                                fehler = %e,
                                "Ping-Senden fehlgeschlagen"
                            );
                            break;
                        }
                        naechster_ping = Instant::now() + keepalive_intervall;
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(peer = %peer_addr, "Shutdown-Signal, Verbindung wird getrennt");
                        // Abschiedsnachricht senden
                        let abschied = SignalMessage::error(
                            SignalMessage::NOTIFICATION_ID,
                            ErrorCode::InternalError,
                            "Server wird heruntergefahren",
                        );
                        let _ = framed.send(abschied).await;
                        break;
                    }
                }
            }
        }

        // Abbau-Kaskade beim Verbindungsende
        dispatcher.client_cleanup(teilnehmer).await;

        tracing::info!(peer = %peer_addr, teilnehmer = %teilnehmer, "Verbindungs-Task beendet");
    }
}
