//! Transport-Handler – CreateTransport, ConnectTransport
//!
//! CreateTransport ist idempotent pro Richtung: die Antwort ist bei
//! Neuanlage und Wiederverwendung identisch aufgebaut. ConnectTransport
//! ueberquert die Engine-Grenze hoechstens einmal pro Transport.

use std::sync::Arc;

use huddle_core::types::ParticipantId;
use huddle_protocol::signal::{
    ConnectTransportRequest, ConnectTransportResponse, CreateTransportRequest,
    CreateTransportResponse, SignalMessage, SignalPayload,
};

use crate::handlers::fehler_antwort;
use crate::server_state::SignalingState;

/// Verarbeitet CreateTransport
pub async fn handle_create_transport(
    request: CreateTransportRequest,
    request_id: u32,
    teilnehmer: ParticipantId,
    state: &Arc<SignalingState>,
) -> SignalMessage {
    match state
        .transporte
        .holen_oder_erstellen(teilnehmer, request.direction)
        .await
    {
        Ok(t) => SignalMessage::new(
            request_id,
            SignalPayload::CreateTransportResponse(CreateTransportResponse {
                transport_id: t.transport_id,
                ice_params: t.ice_params,
                ice_candidates: t.ice_candidates,
                dtls_params: t.dtls_params,
            }),
        ),
        Err(e) => {
            tracing::warn!(teilnehmer = %teilnehmer, fehler = %e, "Transport-Anlage fehlgeschlagen");
            fehler_antwort(request_id, &e)
        }
    }
}

/// Verarbeitet ConnectTransport
///
/// Ein bereits verbundener Transport antwortet ebenfalls mit Erfolg
/// (No-op), Clients duerfen Connect also gefahrlos wiederholen.
pub async fn handle_connect_transport(
    request: ConnectTransportRequest,
    request_id: u32,
    teilnehmer: ParticipantId,
    state: &Arc<SignalingState>,
) -> SignalMessage {
    match state
        .transporte
        .verbinden(teilnehmer, request.direction, request.dtls_params)
        .await
    {
        Ok(_neu_verbunden) => SignalMessage::new(
            request_id,
            SignalPayload::ConnectTransportResponse(ConnectTransportResponse { success: true }),
        ),
        Err(e) => {
            tracing::warn!(teilnehmer = %teilnehmer, fehler = %e, "Transport-Connect fehlgeschlagen");
            fehler_antwort(request_id, &e)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
