//! Abbau-Kaskade und Engine-Ereignis-Schleife
//!
//! Ein Verbindungsende (sauber oder abrupt) raeumt alle Ressourcen des
//! Teilnehmers ab: Abonnements, Produzenten, Transporte, Send-Queue.
//! Die verbleibenden Teilnehmer bekommen pro verschwundener Quelle
//! (Korrelations-Tag) genau eine Entfernungs-Benachrichtigung.
//!
//! Die Ereignis-Schleife verarbeitet engine-seitige Schliessungen und
//! haelt die Indizes der Koordinatoren konsistent. Ein Engine-Ausfall
//! ist fatal und loest den Shutdown des Prozesses aus.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, watch};
use tracing::{debug, error, info, warn};

use huddle_core::types::{CorrelationTag, ParticipantId};
use huddle_media::EngineEreignis;

use crate::server_state::SignalingState;

/// Raeumt alle Ressourcen eines Teilnehmers ab
///
/// Reihenfolge: erst die Indizes (Abonnements, Produzenten), dann die
/// Engine-Transporte (deren Schliessung kaskadiert engine-seitig),
/// zuletzt die Benachrichtigungen und die Send-Queue.
pub async fn teilnehmer_trennen(state: &Arc<SignalingState>, teilnehmer: ParticipantId) {
    let abonnements = state.konsumenten.von_teilnehmer_entfernen(teilnehmer);
    let produzenten = state.produzenten.von_teilnehmer_entfernen(teilnehmer);

    // Abonnements anderer Teilnehmer auf die verschwundenen Flows
    for eintrag in &produzenten {
        state.konsumenten.von_produzent_entfernen(eintrag.producer_id);
    }

    let transporte = state.transporte.von_teilnehmer_entfernen(teilnehmer).await;

    // Eine Benachrichtigung pro Quelle, nicht pro Flow
    let tags: HashSet<CorrelationTag> = produzenten
        .iter()
        .map(|e| e.correlation_tag.clone())
        .collect();
    for tag in tags {
        state.broadcaster.entfernung_ankuendigen(&teilnehmer, tag);
    }

    state.broadcaster.teilnehmer_entfernen(&teilnehmer);

    info!(
        teilnehmer = %teilnehmer,
        produzenten = produzenten.len(),
        abonnements,
        transporte = transporte.len(),
        "Teilnehmer-Ressourcen abgeraeumt"
    );
}

/// Verarbeitet den Ereignis-Strom der Engine bis zum Shutdown
///
/// Engine-seitige Schliessungen bereinigen die Koordinator-Indizes;
/// verschwundene Produzenten werden den anderen Teilnehmern gemeldet.
/// Bei `Ausfall` wird der Shutdown ausgeloest und die Schleife beendet.
pub async fn ereignis_schleife(state: Arc<SignalingState>, shutdown_tx: watch::Sender<bool>) {
    let mut ereignisse = state.engine.ereignisse();

    loop {
        let ereignis = match ereignisse.recv().await {
            Ok(e) => e,
            Err(RecvError::Lagged(verpasst)) => {
                warn!(verpasst, "Engine-Ereignisse verpasst");
                continue;
            }
            Err(RecvError::Closed) => {
                debug!("Engine-Ereignis-Kanal geschlossen");
                break;
            }
        };

        match ereignis {
            EngineEreignis::TransportGeschlossen { transport_id } => {
                state.transporte.nach_engine_schliessung_entfernen(transport_id);
            }

            EngineEreignis::ProduzentGeschlossen { producer_id } => {
                // Nur melden wenn der Produzent noch im Index stand;
                // beim Teilnehmer-Trennen ist er bereits abgeraeumt
                if let Some(eintrag) = state.produzenten.entfernen(producer_id) {
                    state.konsumenten.von_produzent_entfernen(producer_id);
                    state
                        .broadcaster
                        .entfernung_ankuendigen(&eintrag.teilnehmer, eintrag.correlation_tag);
                }
            }

            EngineEreignis::KonsumentGeschlossen { consumer_id } => {
                state.konsumenten.nach_engine_schliessung_entfernen(consumer_id);
            }

            EngineEreignis::Ausfall { grund } => {
                error!(grund = %grund, "Engine-Ausfall, Server wird heruntergefahren");
                let _ = shutdown_tx.send(true);
                break;
            }
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
    use huddle_core::types::ProducerId;
    use huddle_media::{LoopbackEngine, MediaEngine};
    use huddle_protocol::rtp::{
        DtlsParams, DtlsRolle, MediaKind, RtpCapabilities, RtpParams, TransportRichtung,
    };
    use huddle_protocol::signal::SignalPayload;

    async fn produzent_anlegen(
        state: &Arc<SignalingState>,
        teilnehmer: ParticipantId,
        tag: &str,
        kind: MediaKind,
    ) -> ProducerId {
        state
            .transporte
            .holen_oder_erstellen(teilnehmer, TransportRichtung::Senden)
            .await
            .unwrap();
        let _ = state
            .transporte
            .verbinden(
                teilnehmer,
                TransportRichtung::Senden,
                DtlsParams {
                    role: DtlsRolle::Client,
                    fingerprints: vec![],
                },
            )
            .await
            .unwrap();
        let (mime, clock, pt) = match kind {
            MediaKind::Audio => ("audio/opus", 48_000, 111),
            MediaKind::Video => ("video/VP8", 90_000, 96),
        };
        state
            .produzenten
            .veroeffentlichen(
                teilnehmer,
                kind,
                RtpParams {
                    mime_type: mime.to_string(),
                    clock_rate: clock,
                    payload_type: pt,
                    ssrc: 3,
                },
                huddle_core::types::CorrelationTag::new(tag),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn trennen_raeumt_alles_ab_und_meldet_pro_quelle_einmal() {
        let engine = LoopbackEngine::neu();
        let state = SignalingState::neu(SessionConfig::default(), Arc::new(engine.clone()));

        let sender = ParticipantId::new();
        let zuschauer = ParticipantId::new();
        let _rx_sender = state.broadcaster.teilnehmer_registrieren(sender);
        let mut rx_zuschauer = state.broadcaster.teilnehmer_registrieren(zuschauer);

        // Audio- und Video-Flow derselben Quelle
        let audio = produzent_anlegen(&state, sender, "webcam", MediaKind::Audio).await;
        let _video = produzent_anlegen(&state, sender, "webcam", MediaKind::Video).await;

        state
            .konsumenten
            .abonnieren(zuschauer, audio, &RtpCapabilities::standard())
            .await
            .unwrap();

        teilnehmer_trennen(&state, sender).await;

        assert_eq!(state.produzenten.anzahl(), 0);
        assert_eq!(state.konsumenten.anzahl(), 0);
        assert!(!state.broadcaster.ist_registriert(&sender));
        // Engine-Transporte des Senders sind zu, der des Zuschauers bleibt
        assert_eq!(engine.anzahl_produzenten(), 0);

        // Genau eine Entfernungs-Benachrichtigung fuer die Quelle
        let mut entfernungen = 0;
        while let Ok(nachricht) = rx_zuschauer.try_recv() {
            if let SignalPayload::ProducerRemoved(n) = nachricht.payload {
                assert_eq!(n.correlation_tag.as_str(), "webcam");
                entfernungen += 1;
            }
        }
        assert_eq!(entfernungen, 1);
    }

    #[tokio::test]
    async fn engine_ausfall_loest_shutdown_aus() {
        let engine = LoopbackEngine::neu();
        let state = SignalingState::neu(SessionConfig::default(), Arc::new(engine.clone()));

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let schleife = tokio::spawn(ereignis_schleife(Arc::clone(&state), shutdown_tx));

        // Sicherstellen dass die Schleife abonniert hat bevor der
        // Ausfall gesendet wird
        tokio::task::yield_now().await;
        engine.ausfall_ausloesen("Prozess der Engine ist gestorben");

        tokio::time::timeout(std::time::Duration::from_secs(1), shutdown_rx.changed())
            .await
            .expect("Shutdown muss ausgeloest werden")
            .unwrap();
        assert!(*shutdown_rx.borrow());
        schleife.await.unwrap();
    }

    #[tokio::test]
    async fn engine_seitige_produzenten_schliessung_wird_gemeldet() {
        let engine = LoopbackEngine::neu();
        let state = SignalingState::neu(SessionConfig::default(), Arc::new(engine.clone()));

        let sender = ParticipantId::new();
        let zuschauer = ParticipantId::new();
        let _rx_sender = state.broadcaster.teilnehmer_registrieren(sender);
        let mut rx_zuschauer = state.broadcaster.teilnehmer_registrieren(zuschauer);

        let producer_id = produzent_anlegen(&state, sender, "mic", MediaKind::Audio).await;

        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        let schleife = tokio::spawn(ereignis_schleife(Arc::clone(&state), shutdown_tx));
        tokio::task::yield_now().await;

        // Engine schliesst den Sende-Transport, der Produzent faellt mit
        let transport_id = state
            .transporte
            .transport_id(sender, TransportRichtung::Senden)
            .unwrap();
        engine.transport_schliessen(transport_id).await.unwrap();

        // Schleife verarbeiten lassen
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(state.produzenten.eintrag(producer_id).is_none());
        let nachricht = rx_zuschauer.try_recv().unwrap();
        assert!(matches!(
            nachricht.payload,
            SignalPayload::ProducerRemoved(_)
        ));

        schleife.abort();
    }
}
