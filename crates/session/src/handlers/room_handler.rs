//! Raum-Handler – CreateRoom
//!
//! Liefert den Faehigkeiten-Satz des Raums. Der Raum wird beim ersten
//! Aufruf erstellt, jeder weitere Aufruf bekommt denselben Satz.

use std::sync::Arc;

use huddle_protocol::signal::{CreateRoomResponse, SignalMessage, SignalPayload};

use crate::handlers::fehler_antwort;
use crate::server_state::SignalingState;

/// Verarbeitet CreateRoom
pub async fn handle_create_room(request_id: u32, state: &Arc<SignalingState>) -> SignalMessage {
    match state.registry.raum_sicherstellen().await {
        Ok(raum) => SignalMessage::new(
            request_id,
            SignalPayload::CreateRoomResponse(CreateRoomResponse {
                rtp_capabilities: raum.faehigkeiten,
            }),
        ),
        Err(e) => {
            tracing::warn!(fehler = %e, "Raum-Erstellung fehlgeschlagen");
            fehler_antwort(request_id, &e)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_state::SessionConfig;
    use huddle_media::LoopbackEngine;

    #[tokio::test]
    async fn create_room_liefert_faehigkeiten() {
        let state = SignalingState::neu(
            SessionConfig::default(),
            Arc::new(LoopbackEngine::neu()),
        );
        let antwort = handle_create_room(1, &state).await;
        assert_eq!(antwort.request_id, 1);
        if let SignalPayload::CreateRoomResponse(r) = antwort.payload {
            assert_eq!(r.rtp_capabilities.codecs.len(), 2);
        } else {
            panic!("Erwartet CreateRoomResponse");
        }
    }

    #[tokio::test]
    async fn create_room_bei_engine_ausfall() {
        let engine = LoopbackEngine::neu();
        engine.ausfall_ausloesen("Testausfall");
        let state = SignalingState::neu(SessionConfig::default(), Arc::new(engine));

        let antwort = handle_create_room(2, &state).await;
        assert!(matches!(antwort.payload, SignalPayload::Error(_)));
    }
}
