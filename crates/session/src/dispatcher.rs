//! Message-Dispatcher – Routet SignalMessages an die richtigen Handler
//!
//! Der Dispatcher empfaengt SignalMessages von einer ClientConnection,
//! bestimmt den richtigen Handler und gibt die Antwort zurueck. Die
//! Teilnehmer-ID wird bei Verbindungsaufbau vergeben und lebt im
//! DispatcherContext; eine Authentifizierung gibt es nicht.

use std::net::SocketAddr;
use std::sync::Arc;

use huddle_core::types::ParticipantId;
use huddle_protocol::signal::{SignalMessage, SignalPayload};

use crate::disconnect;
use crate::error::SessionError;
use crate::handlers::{
    consumer_handler, fehler_antwort, producer_handler, room_handler, transport_handler,
};
use crate::server_state::SignalingState;

/// Dispatcher-Kontext – Informationen ueber die aktuelle Verbindung
pub struct DispatcherContext {
    /// Peer-IP-Adresse (fuer Logs)
    pub peer_addr: SocketAddr,
    /// Teilnehmer-ID dieser Verbindung (bei Verbindungsaufbau vergeben)
    pub teilnehmer: ParticipantId,
}

/// Zentraler Message-Dispatcher
///
/// Routet eingehende SignalMessages an die entsprechenden Handler und
/// gibt die Antwort-SignalMessage zurueck.
pub struct MessageDispatcher {
    state: Arc<SignalingState>,
}

impl MessageDispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    /// Verarbeitet eine eingehende SignalMessage und gibt die Antwort zurueck
    ///
    /// Gibt `None` zurueck wenn keine Antwort gesendet werden soll
    /// (z.B. bei Pong-Antworten die intern verarbeitet werden).
    pub async fn dispatch(
        &self,
        message: SignalMessage,
        ctx: &DispatcherContext,
    ) -> Option<SignalMessage> {
        let request_id = message.request_id;
        let teilnehmer = ctx.teilnehmer;

        match message.payload {
            // -------------------------------------------------------------------
            // Raum
            // -------------------------------------------------------------------
            SignalPayload::CreateRoom => {
                Some(room_handler::handle_create_room(request_id, &self.state).await)
            }

            // -------------------------------------------------------------------
            // Transport
            // -------------------------------------------------------------------
            SignalPayload::CreateTransport(req) => Some(
                transport_handler::handle_create_transport(
                    req,
                    request_id,
                    teilnehmer,
                    &self.state,
                )
                .await,
            ),

            SignalPayload::ConnectTransport(req) => Some(
                transport_handler::handle_connect_transport(
                    req,
                    request_id,
                    teilnehmer,
                    &self.state,
                )
                .await,
            ),

            // -------------------------------------------------------------------
            // Produzent
            // -------------------------------------------------------------------
            SignalPayload::Publish(req) => Some(
                producer_handler::handle_publish(req, request_id, teilnehmer, &self.state).await,
            ),

            SignalPayload::ListProducers => {
                Some(producer_handler::handle_list_producers(request_id, &self.state).await)
            }

            // -------------------------------------------------------------------
            // Konsument
            // -------------------------------------------------------------------
            SignalPayload::Subscribe(req) => Some(
                consumer_handler::handle_subscribe(req, request_id, teilnehmer, &self.state).await,
            ),

            SignalPayload::ResumeConsumer(req) => Some(
                consumer_handler::handle_resume_consumer(req, request_id, teilnehmer, &self.state)
                    .await,
            ),

            // -------------------------------------------------------------------
            // Keepalive
            // -------------------------------------------------------------------
            SignalPayload::Ping(ping) => {
                let server_ts = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis() as u64;
                Some(SignalMessage::pong(request_id, ping.timestamp_ms, server_ts))
            }

            SignalPayload::Pong(_) => {
                // Pong-Antworten vom Client werden nur geloggt (RTT-Messung)
                tracing::trace!(teilnehmer = %teilnehmer, "Pong empfangen");
                None
            }

            // -------------------------------------------------------------------
            // Unerwartete Server->Client Nachrichten
            // -------------------------------------------------------------------
            SignalPayload::CreateRoomResponse(_)
            | SignalPayload::CreateTransportResponse(_)
            | SignalPayload::ConnectTransportResponse(_)
            | SignalPayload::PublishResponse(_)
            | SignalPayload::ListProducersResponse(_)
            | SignalPayload::SubscribeResponse(_)
            | SignalPayload::ResumeConsumerResponse(_)
            | SignalPayload::Welcome(_)
            | SignalPayload::ProducerAdded(_)
            | SignalPayload::ProducerRemoved(_)
            | SignalPayload::Error(_) => {
                tracing::warn!(
                    teilnehmer = %teilnehmer,
                    request_id,
                    "Unerwartete Server->Client Nachricht vom Client empfangen"
                );
                let fehler = SessionError::UngueltigeAnfrage("Unerwartete Nachricht".to_string());
                Some(fehler_antwort(request_id, &fehler))
            }
        }
    }

    /// Bereinigt alle Ressourcen eines Teilnehmers beim Trennen
    pub async fn client_cleanup(&self, teilnehmer: ParticipantId) {
        disconnect::teilnehmer_trennen(&self.state, teilnehmer).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
