//! Integration-Szenarien fuer den Session-Koordinator
//!
//! Spielt vollstaendige Ablaeufe ueber den Dispatcher durch, mit der
//! LoopbackEngine als Media-Engine. Die Engine-Zaehler machen sichtbar
//! wie oft die Engine-Grenze tatsaechlich ueberquert wird.

use std::sync::Arc;

use huddle_core::types::{CorrelationTag, ParticipantId, ProducerId};
use huddle_media::LoopbackEngine;
use huddle_protocol::rtp::{
    DtlsParams, DtlsRolle, MediaKind, RtpCapabilities, RtpParams, TransportRichtung,
};
use huddle_protocol::signal::{
    ConnectTransportRequest, CreateTransportRequest, ErrorCode, PublishRequest,
    ResumeConsumerRequest, SignalMessage, SignalPayload, SubscribeRequest,
};
use huddle_session::{DispatcherContext, MessageDispatcher, SessionConfig, SignalingState};

struct Testaufbau {
    engine: LoopbackEngine,
    state: Arc<SignalingState>,
    dispatcher: MessageDispatcher,
}

fn aufbau() -> Testaufbau {
    let engine = LoopbackEngine::neu();
    let state = SignalingState::neu(SessionConfig::default(), Arc::new(engine.clone()));
    let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
    Testaufbau {
        engine,
        state,
        dispatcher,
    }
}

fn teilnehmer_kontext(teilnehmer: ParticipantId) -> DispatcherContext {
    DispatcherContext {
        peer_addr: "127.0.0.1:50000".parse().unwrap(),
        teilnehmer,
    }
}

fn dtls() -> DtlsParams {
    DtlsParams {
        role: DtlsRolle::Client,
        fingerprints: vec![],
    }
}

fn opus_params() -> RtpParams {
    RtpParams {
        mime_type: "audio/opus".to_string(),
        clock_rate: 48_000,
        payload_type: 111,
        ssrc: 100,
    }
}

async fn anfrage(
    aufbau: &Testaufbau,
    ctx: &DispatcherContext,
    request_id: u32,
    payload: SignalPayload,
) -> SignalMessage {
    aufbau
        .dispatcher
        .dispatch(SignalMessage::new(request_id, payload), ctx)
        .await
        .expect("Anfrage muss eine Antwort bekommen")
}

/// Sende-Transport anlegen, verbinden und einen Audio-Flow veroeffentlichen
async fn veroeffentlichen(
    aufbau: &Testaufbau,
    ctx: &DispatcherContext,
    tag: &str,
) -> ProducerId {
    anfrage(
        aufbau,
        ctx,
        1,
        SignalPayload::CreateTransport(CreateTransportRequest {
            direction: TransportRichtung::Senden,
        }),
    )
    .await;
    anfrage(
        aufbau,
        ctx,
        2,
        SignalPayload::ConnectTransport(ConnectTransportRequest {
            direction: TransportRichtung::Senden,
            dtls_params: dtls(),
        }),
    )
    .await;
    let antwort = anfrage(
        aufbau,
        ctx,
        3,
        SignalPayload::Publish(PublishRequest {
            kind: MediaKind::Audio,
            rtp_params: opus_params(),
            correlation_tag: CorrelationTag::new(tag),
        }),
    )
    .await;
    match antwort.payload {
        SignalPayload::PublishResponse(r) => r.producer_id,
        anderes => panic!("Erwartet PublishResponse, bekommen: {anderes:?}"),
    }
}

#[tokio::test]
async fn erster_teilnehmer_erstellt_den_raum_der_zweite_bekommt_ihn() {
    let a = aufbau();
    let anna = teilnehmer_kontext(ParticipantId::new());
    let ben = teilnehmer_kontext(ParticipantId::new());

    let erste = anfrage(&a, &anna, 1, SignalPayload::CreateRoom).await;
    let zweite = anfrage(&a, &ben, 1, SignalPayload::CreateRoom).await;

    let (caps_a, caps_b) = match (erste.payload, zweite.payload) {
        (
            SignalPayload::CreateRoomResponse(x),
            SignalPayload::CreateRoomResponse(y),
        ) => (x.rtp_capabilities, y.rtp_capabilities),
        _ => panic!("Erwartet CreateRoomResponse"),
    };

    assert_eq!(caps_a, caps_b);
    assert_eq!(a.engine.anzahl_kontexte(), 1);
}

#[tokio::test]
async fn transport_pro_richtung_und_teilnehmer() {
    let a = aufbau();
    let anna = teilnehmer_kontext(ParticipantId::new());
    let ben = teilnehmer_kontext(ParticipantId::new());

    // Anna fordert ihren Sende-Transport dreimal an
    let mut ids = Vec::new();
    for request_id in 1..=3 {
        let antwort = anfrage(
            &a,
            &anna,
            request_id,
            SignalPayload::CreateTransport(CreateTransportRequest {
                direction: TransportRichtung::Senden,
            }),
        )
        .await;
        if let SignalPayload::CreateTransportResponse(r) = antwort.payload {
            ids.push(r.transport_id);
        } else {
            panic!("Erwartet CreateTransportResponse");
        }
    }
    assert!(ids.windows(2).all(|w| w[0] == w[1]));

    // Bens Sende-Transport ist ein anderer
    let antwort = anfrage(
        &a,
        &ben,
        1,
        SignalPayload::CreateTransport(CreateTransportRequest {
            direction: TransportRichtung::Senden,
        }),
    )
    .await;
    if let SignalPayload::CreateTransportResponse(r) = antwort.payload {
        assert_ne!(r.transport_id, ids[0]);
    } else {
        panic!("Erwartet CreateTransportResponse");
    }

    assert_eq!(a.engine.anzahl_transporte(), 2);
}

#[tokio::test]
async fn doppelter_connect_ueberquert_die_engine_grenze_einmal() {
    let a = aufbau();
    let anna = teilnehmer_kontext(ParticipantId::new());

    let antwort = anfrage(
        &a,
        &anna,
        1,
        SignalPayload::CreateTransport(CreateTransportRequest {
            direction: TransportRichtung::Senden,
        }),
    )
    .await;
    let transport_id = match antwort.payload {
        SignalPayload::CreateTransportResponse(r) => r.transport_id,
        _ => panic!("Erwartet CreateTransportResponse"),
    };

    for request_id in [2, 3] {
        let antwort = anfrage(
            &a,
            &anna,
            request_id,
            SignalPayload::ConnectTransport(ConnectTransportRequest {
                direction: TransportRichtung::Senden,
                dtls_params: dtls(),
            }),
        )
        .await;
        assert!(matches!(
            antwort.payload,
            SignalPayload::ConnectTransportResponse(_)
        ));
    }

    assert_eq!(a.engine.verbindungs_zaehler(transport_id), 1);
}

#[tokio::test]
async fn publish_vor_connect_wird_abgelehnt() {
    let a = aufbau();
    let anna = teilnehmer_kontext(ParticipantId::new());

    anfrage(
        &a,
        &anna,
        1,
        SignalPayload::CreateTransport(CreateTransportRequest {
            direction: TransportRichtung::Senden,
        }),
    )
    .await;

    let antwort = anfrage(
        &a,
        &anna,
        2,
        SignalPayload::Publish(PublishRequest {
            kind: MediaKind::Audio,
            rtp_params: opus_params(),
            correlation_tag: CorrelationTag::new("mic"),
        }),
    )
    .await;

    if let SignalPayload::Error(e) = antwort.payload {
        assert_eq!(e.code, ErrorCode::TransportNotReady);
    } else {
        panic!("Erwartet Error-Response");
    }
    assert_eq!(a.engine.anzahl_produzenten(), 0);
}

#[tokio::test]
async fn spaet_beitretender_entdeckt_fremde_produzenten() {
    let a = aufbau();
    let anna = teilnehmer_kontext(ParticipantId::new());
    let producer_id = veroeffentlichen(&a, &anna, "mic").await;

    // Ben tritt spaeter bei
    let ben = teilnehmer_kontext(ParticipantId::new());
    assert!(a.state.produzenten.hat_produzenten());

    let antwort = anfrage(&a, &ben, 1, SignalPayload::ListProducers).await;
    if let SignalPayload::ListProducersResponse(r) = antwort.payload {
        assert_eq!(r.producers.len(), 1);
        assert_eq!(r.producers[0].producer_id, producer_id);
    } else {
        panic!("Erwartet ListProducersResponse");
    }

    // Die Liste fuehrt alle live Produzenten, auch fuer Anna selbst
    let antwort = anfrage(&a, &anna, 4, SignalPayload::ListProducers).await;
    if let SignalPayload::ListProducersResponse(r) = antwort.payload {
        assert_eq!(r.producers.len(), 1);
        assert_eq!(r.producers[0].producer_id, producer_id);
    } else {
        panic!("Erwartet ListProducersResponse");
    }
}

#[tokio::test]
async fn audio_und_video_derselben_quelle_werden_beide_angekuendigt() {
    let a = aufbau();
    let anna = teilnehmer_kontext(ParticipantId::new());
    let ben = teilnehmer_kontext(ParticipantId::new());
    let mut rx_ben = a.state.broadcaster.teilnehmer_registrieren(ben.teilnehmer);

    // Anna veroeffentlicht Audio und Video unter demselben Tag
    let audio = veroeffentlichen(&a, &anna, "webcam").await;
    let antwort = anfrage(
        &a,
        &anna,
        4,
        SignalPayload::Publish(PublishRequest {
            kind: MediaKind::Video,
            rtp_params: RtpParams {
                mime_type: "video/VP8".to_string(),
                clock_rate: 90_000,
                payload_type: 96,
                ssrc: 101,
            },
            correlation_tag: CorrelationTag::new("webcam"),
        }),
    )
    .await;
    let video = match antwort.payload {
        SignalPayload::PublishResponse(r) => r.producer_id,
        anderes => panic!("Erwartet PublishResponse, bekommen: {anderes:?}"),
    };

    // Ben bekommt genau zwei Ankuendigungen, eine pro Flow
    let mut angekuendigt = Vec::new();
    while let Ok(nachricht) = rx_ben.try_recv() {
        if let SignalPayload::ProducerAdded(n) = nachricht.payload {
            angekuendigt.push((n.producer_id, n.kind));
        }
    }
    assert_eq!(angekuendigt.len(), 2);
    assert!(angekuendigt.contains(&(audio, MediaKind::Audio)));
    assert!(angekuendigt.contains(&(video, MediaKind::Video)));

    // Bens Liste enthaelt beide Flows
    let antwort = anfrage(&a, &ben, 1, SignalPayload::ListProducers).await;
    if let SignalPayload::ListProducersResponse(r) = antwort.payload {
        let ids: Vec<ProducerId> = r.producers.iter().map(|p| p.producer_id).collect();
        assert!(ids.contains(&audio));
        assert!(ids.contains(&video));
    } else {
        panic!("Erwartet ListProducersResponse");
    }
}

#[tokio::test]
async fn abonnement_pausiert_dann_fortsetzen() {
    let a = aufbau();
    let anna = teilnehmer_kontext(ParticipantId::new());
    let producer_id = veroeffentlichen(&a, &anna, "mic").await;

    let ben = teilnehmer_kontext(ParticipantId::new());
    let antwort = anfrage(
        &a,
        &ben,
        1,
        SignalPayload::Subscribe(SubscribeRequest {
            producer_id,
            rtp_capabilities: RtpCapabilities::standard(),
        }),
    )
    .await;
    let consumer_id = match antwort.payload {
        SignalPayload::SubscribeResponse(r) => {
            assert_eq!(r.producer_id, producer_id);
            assert_eq!(r.kind, MediaKind::Audio);
            r.consumer_id
        }
        anderes => panic!("Erwartet SubscribeResponse, bekommen: {anderes:?}"),
    };
    assert_eq!(a.engine.ist_pausiert(consumer_id), Some(true));

    // Doppeltes Abonnement liefert denselben Konsumenten
    let antwort = anfrage(
        &a,
        &ben,
        2,
        SignalPayload::Subscribe(SubscribeRequest {
            producer_id,
            rtp_capabilities: RtpCapabilities::standard(),
        }),
    )
    .await;
    if let SignalPayload::SubscribeResponse(r) = antwort.payload {
        assert_eq!(r.consumer_id, consumer_id);
    } else {
        panic!("Erwartet SubscribeResponse");
    }
    assert_eq!(a.engine.anzahl_konsumenten(), 1);

    let antwort = anfrage(
        &a,
        &ben,
        3,
        SignalPayload::ResumeConsumer(ResumeConsumerRequest { producer_id }),
    )
    .await;
    assert!(matches!(
        antwort.payload,
        SignalPayload::ResumeConsumerResponse(_)
    ));
    assert_eq!(a.engine.ist_pausiert(consumer_id), Some(false));
}

#[tokio::test]
async fn abonnement_mit_unpassenden_faehigkeiten_wird_abgelehnt() {
    let a = aufbau();
    let anna = teilnehmer_kontext(ParticipantId::new());
    let producer_id = veroeffentlichen(&a, &anna, "mic").await;

    let ben = teilnehmer_kontext(ParticipantId::new());
    let nur_video = RtpCapabilities {
        codecs: vec![huddle_protocol::rtp::CodecProfile::vp8_standard()],
    };
    let antwort = anfrage(
        &a,
        &ben,
        1,
        SignalPayload::Subscribe(SubscribeRequest {
            producer_id,
            rtp_capabilities: nur_video,
        }),
    )
    .await;

    if let SignalPayload::Error(e) = antwort.payload {
        assert_eq!(e.code, ErrorCode::NotConsumable);
    } else {
        panic!("Erwartet Error-Response");
    }
}

#[tokio::test]
async fn publish_benachrichtigt_alle_ausser_den_ausloeser() {
    let a = aufbau();
    let anna = teilnehmer_kontext(ParticipantId::new());
    let ben = ParticipantId::new();
    let clara = ParticipantId::new();

    let mut rx_anna = a.state.broadcaster.teilnehmer_registrieren(anna.teilnehmer);
    let mut rx_ben = a.state.broadcaster.teilnehmer_registrieren(ben);
    let mut rx_clara = a.state.broadcaster.teilnehmer_registrieren(clara);

    let producer_id = veroeffentlichen(&a, &anna, "mic").await;

    assert!(rx_anna.try_recv().is_err(), "Ausloeser darf nichts empfangen");
    for rx in [&mut rx_ben, &mut rx_clara] {
        let nachricht = rx.try_recv().unwrap();
        assert_eq!(nachricht.request_id, SignalMessage::NOTIFICATION_ID);
        if let SignalPayload::ProducerAdded(n) = nachricht.payload {
            assert_eq!(n.producer_id, producer_id);
        } else {
            panic!("Erwartet ProducerAdded-Benachrichtigung");
        }
    }
}

#[tokio::test]
async fn trennung_raeumt_ab_und_meldet_pro_quelle_genau_einmal() {
    let a = aufbau();
    let anna = teilnehmer_kontext(ParticipantId::new());
    let ben = teilnehmer_kontext(ParticipantId::new());

    let _rx_anna = a.state.broadcaster.teilnehmer_registrieren(anna.teilnehmer);
    let mut rx_ben = a.state.broadcaster.teilnehmer_registrieren(ben.teilnehmer);

    // Anna veroeffentlicht Audio und Video derselben Quelle
    let audio = veroeffentlichen(&a, &anna, "webcam").await;
    let antwort = anfrage(
        &a,
        &anna,
        4,
        SignalPayload::Publish(PublishRequest {
            kind: MediaKind::Video,
            rtp_params: RtpParams {
                mime_type: "video/VP8".to_string(),
                clock_rate: 90_000,
                payload_type: 96,
                ssrc: 101,
            },
            correlation_tag: CorrelationTag::new("webcam"),
        }),
    )
    .await;
    assert!(matches!(antwort.payload, SignalPayload::PublishResponse(_)));

    // Ben abonniert Annas Audio
    anfrage(
        &a,
        &ben,
        1,
        SignalPayload::Subscribe(SubscribeRequest {
            producer_id: audio,
            rtp_capabilities: RtpCapabilities::standard(),
        }),
    )
    .await;

    // Anna trennt sich
    a.dispatcher.client_cleanup(anna.teilnehmer).await;

    assert_eq!(a.state.produzenten.anzahl(), 0);
    assert_eq!(a.state.konsumenten.anzahl(), 0);
    assert_eq!(a.engine.anzahl_produzenten(), 0);
    assert_eq!(a.engine.anzahl_konsumenten(), 0);

    // Ben sieht genau eine Entfernung der Quelle "webcam"
    let mut entfernungen = 0;
    while let Ok(nachricht) = rx_ben.try_recv() {
        if let SignalPayload::ProducerRemoved(n) = nachricht.payload {
            assert_eq!(n.correlation_tag.as_str(), "webcam");
            entfernungen += 1;
        }
    }
    assert_eq!(entfernungen, 1);

    // Die Liste ist fuer Ben wieder leer
    let antwort = anfrage(&a, &ben, 2, SignalPayload::ListProducers).await;
    if let SignalPayload::ListProducersResponse(r) = antwort.payload {
        assert!(r.producers.is_empty());
    } else {
        panic!("Erwartet ListProducersResponse");
    }
}

#[tokio::test]
async fn engine_ausfall_macht_anfragen_zu_engine_failure() {
    let a = aufbau();
    let anna = teilnehmer_kontext(ParticipantId::new());

    a.engine.ausfall_ausloesen("Engine-Prozess gestorben");

    let antwort = anfrage(&a, &anna, 1, SignalPayload::CreateRoom).await;
    if let SignalPayload::Error(e) = antwort.payload {
        assert_eq!(e.code, ErrorCode::EngineFailure);
    } else {
        panic!("Erwartet Error-Response");
    }
}
