//! Konsumenten-Handler – Subscribe, ResumeConsumer
//!
//! Subscribe erstellt (oder liefert) das Abonnement des Teilnehmers fuer
//! einen fremden Produzenten; der Konsument startet pausiert.
//! ResumeConsumer startet den Medienfluss; ohne bekanntes Abonnement
//! ist es ein gutartiger No-op mit Erfolgs-Antwort.

use std::sync::Arc;

use huddle_core::types::ParticipantId;
use huddle_protocol::signal::{
    ResumeConsumerRequest, ResumeConsumerResponse, SignalMessage, SignalPayload, SubscribeRequest,
    SubscribeResponse,
};

use crate::handlers::fehler_antwort;
use crate::server_state::SignalingState;

/// Verarbeitet Subscribe
pub async fn handle_subscribe(
    request: SubscribeRequest,
    request_id: u32,
    teilnehmer: ParticipantId,
    state: &Arc<SignalingState>,
) -> SignalMessage {
    match state
        .konsumenten
        .abonnieren(teilnehmer, request.producer_id, &request.rtp_capabilities)
        .await
    {
        Ok(b) => SignalMessage::new(
            request_id,
            SignalPayload::SubscribeResponse(SubscribeResponse {
                consumer_id: b.consumer_id,
                producer_id: b.producer_id,
                kind: b.kind,
                rtp_params: b.rtp_params,
            }),
        ),
        Err(e) => {
            tracing::warn!(teilnehmer = %teilnehmer, fehler = %e, "Subscribe fehlgeschlagen");
            fehler_antwort(request_id, &e)
        }
    }
}

/// Verarbeitet ResumeConsumer
pub async fn handle_resume_consumer(
    request: ResumeConsumerRequest,
    request_id: u32,
    teilnehmer: ParticipantId,
    state: &Arc<SignalingState>,
) -> SignalMessage {
    match state
        .konsumenten
        .fortsetzen(teilnehmer, request.producer_id)
        .await
    {
        Ok(_fortgesetzt) => SignalMessage::new(
            request_id,
            SignalPayload::ResumeConsumerResponse(ResumeConsumerResponse { success: true }),
        ),
        Err(e) => {
            tracing::warn!(teilnehmer = %teilnehmer, fehler = %e, "Resume fehlgeschlagen");
            fehler_antwort(request_id, &e)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
