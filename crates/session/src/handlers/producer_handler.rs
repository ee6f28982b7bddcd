//! Produzenten-Handler – Publish, ListProducers
//!
//! Publish erstellt den Engine-Produzenten und kuendigt ihn bei allen
//! anderen Teilnehmern an. Die Ankuendigung ist best-effort und hat
//! keinen Einfluss auf die Antwort an den Veroeffentlichenden.

use std::sync::Arc;

use huddle_core::types::ParticipantId;
use huddle_protocol::signal::{
    ListProducersResponse, PublishRequest, PublishResponse, SignalMessage, SignalPayload,
};

use crate::handlers::fehler_antwort;
use crate::server_state::SignalingState;

/// Verarbeitet Publish
pub async fn handle_publish(
    request: PublishRequest,
    request_id: u32,
    teilnehmer: ParticipantId,
    state: &Arc<SignalingState>,
) -> SignalMessage {
    let kind = request.kind;
    match state
        .produzenten
        .veroeffentlichen(teilnehmer, kind, request.rtp_params, request.correlation_tag)
        .await
    {
        Ok(producer_id) => {
            let benachrichtigt = state
                .broadcaster
                .veroeffentlichung_ankuendigen(&teilnehmer, producer_id, kind);
            tracing::debug!(
                producer_id = %producer_id,
                benachrichtigt,
                "Veroeffentlichung angekuendigt"
            );
            SignalMessage::new(
                request_id,
                SignalPayload::PublishResponse(PublishResponse { producer_id }),
            )
        }
        Err(e) => {
            tracing::warn!(teilnehmer = %teilnehmer, fehler = %e, "Publish fehlgeschlagen");
            fehler_antwort(request_id, &e)
        }
    }
}

/// Verarbeitet ListProducers
///
/// Discovery fuer spaet beitretende Teilnehmer: die Liste enthaelt alle
/// live Produzenten, auch die eigenen.
pub async fn handle_list_producers(
    request_id: u32,
    state: &Arc<SignalingState>,
) -> SignalMessage {
    let producers = state.produzenten.auflisten();
    SignalMessage::new(
        request_id,
        SignalPayload::ListProducersResponse(ListProducersResponse { producers }),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
