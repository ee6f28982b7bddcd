//! Signaling-Protokoll
//!
//! Definiert alle Nachrichten die ueber den persistenten Signaling-Kanal
//! zwischen Teilnehmer und Server ausgetauscht werden.
//!
//! ## Design
//! - Request/Response Pattern: jede Nachricht hat eine `request_id: u32`
//! - Server-Benachrichtigungen (Welcome, ProducerAdded, ProducerRemoved)
//!   tragen `request_id = 0` und erwarten keine Antwort
//! - JSON-Serialisierung via serde, Tagged Enums fuer typsichere
//!   Nachrichtentypen

use serde::{Deserialize, Serialize};

use huddle_core::types::{ConsumerId, CorrelationTag, ParticipantId, ProducerId, TransportId};

use crate::rtp::{DtlsParams, IceCandidate, IceParams, MediaKind, RtpCapabilities, RtpParams, TransportRichtung};

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Standardisierte Fehler-Codes fuer Error-Responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Allgemein
    InternalError,
    InvalidRequest,
    ServerFull,
    // Transport
    TransportNotFound,
    TransportNotReady,
    // Produzent / Konsument
    ProducerNotFound,
    ConsumerNotFound,
    NotConsumable,
    // Engine
    EngineFailure,
}

// ---------------------------------------------------------------------------
// Raum-Nachrichten
// ---------------------------------------------------------------------------

/// Antwort auf CreateRoom: der ausgehandelte Faehigkeiten-Satz des Raums
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub rtp_capabilities: RtpCapabilities,
}

// ---------------------------------------------------------------------------
// Transport-Nachrichten
// ---------------------------------------------------------------------------

/// Transport anfordern (idempotent pro Richtung)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransportRequest {
    pub direction: TransportRichtung,
}

/// Verbindungsparameter eines Transports
///
/// Wird sowohl bei Neuanlage als auch bei Wiederverwendung identisch
/// beantwortet, der Client kann beide Faelle nicht unterscheiden.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransportResponse {
    pub transport_id: TransportId,
    pub ice_params: IceParams,
    pub ice_candidates: Vec<IceCandidate>,
    pub dtls_params: DtlsParams,
}

/// Transport mit den DTLS-Parametern der Gegenseite verbinden
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectTransportRequest {
    pub direction: TransportRichtung,
    pub dtls_params: DtlsParams,
}

/// Bestaetigung des Transport-Connects (auch bei No-op)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectTransportResponse {
    pub success: bool,
}

// ---------------------------------------------------------------------------
// Produzenten-Nachrichten
// ---------------------------------------------------------------------------

/// Medien-Flow veroeffentlichen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    pub kind: MediaKind,
    pub rtp_params: RtpParams,
    /// Gruppiert Audio- und Video-Flow derselben Quelle
    pub correlation_tag: CorrelationTag,
}

/// Antwort auf Publish
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishResponse {
    pub producer_id: ProducerId,
}

/// Ein live Produzent aus Sicht der anderen Teilnehmer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerInfo {
    pub producer_id: ProducerId,
    pub kind: MediaKind,
}

/// Liste aller live Produzenten (Join-after-Publish-Discovery)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListProducersResponse {
    pub producers: Vec<ProducerInfo>,
}

// ---------------------------------------------------------------------------
// Konsumenten-Nachrichten
// ---------------------------------------------------------------------------

/// Fremden Produzenten abonnieren
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub producer_id: ProducerId,
    /// Faehigkeiten des anfragenden Clients
    pub rtp_capabilities: RtpCapabilities,
}

/// Antwort auf Subscribe, der Konsument startet pausiert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeResponse {
    pub consumer_id: ConsumerId,
    pub producer_id: ProducerId,
    pub kind: MediaKind,
    pub rtp_params: RtpParams,
}

/// Pausierten Konsumenten fortsetzen (adressiert ueber den Produzenten)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeConsumerRequest {
    pub producer_id: ProducerId,
}

/// Bestaetigung des Resume (auch bei No-op)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeConsumerResponse {
    pub success: bool,
}

// ---------------------------------------------------------------------------
// Server-Benachrichtigungen
// ---------------------------------------------------------------------------

/// Begruessung direkt nach Verbindungsaufbau
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeNotification {
    /// Kanal-gebundene Teilnehmer-ID dieser Verbindung
    pub participant_id: ParticipantId,
    /// Gibt es bereits live Produzenten im Raum?
    pub has_producers: bool,
}

/// Neuer Medien-Flow verfuegbar, Empfaenger koennen abonnieren
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerAddedNotification {
    pub producer_id: ProducerId,
    pub kind: MediaKind,
}

/// Quelle entfernt; Empfaenger raeumen Audio- und Video-Konsumenten
/// dieser Quelle gemeinsam ab (daher Korrelations-Tag statt ProducerId)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerRemovedNotification {
    pub correlation_tag: CorrelationTag,
}

// ---------------------------------------------------------------------------
// Keepalive
// ---------------------------------------------------------------------------

/// Ping (Client -> Server oder Server -> Client)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingMessage {
    /// Unix-Timestamp in Millisekunden fuer RTT-Messung
    pub timestamp_ms: u64,
}

/// Pong-Antwort (spiegelt Timestamp zurueck)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PongMessage {
    /// Originaler Timestamp aus dem Ping
    pub echo_timestamp_ms: u64,
    /// Server-eigener Timestamp
    pub server_timestamp_ms: u64,
}

// ---------------------------------------------------------------------------
// Haupt-Enum: SignalPayload
// ---------------------------------------------------------------------------

/// Alle moeglichen Signaling-Nachrichten (typsicher via Tagged Enum)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalPayload {
    // Raum
    CreateRoom,
    CreateRoomResponse(CreateRoomResponse),

    // Transport
    CreateTransport(CreateTransportRequest),
    CreateTransportResponse(CreateTransportResponse),
    ConnectTransport(ConnectTransportRequest),
    ConnectTransportResponse(ConnectTransportResponse),

    // Produzent
    Publish(PublishRequest),
    PublishResponse(PublishResponse),
    ListProducers,
    ListProducersResponse(ListProducersResponse),

    // Konsument
    Subscribe(SubscribeRequest),
    SubscribeResponse(SubscribeResponse),
    ResumeConsumer(ResumeConsumerRequest),
    ResumeConsumerResponse(ResumeConsumerResponse),

    // Benachrichtigungen (Server -> Client, request_id = 0)
    Welcome(WelcomeNotification),
    ProducerAdded(ProducerAddedNotification),
    ProducerRemoved(ProducerRemovedNotification),

    // Keepalive
    Ping(PingMessage),
    Pong(PongMessage),

    // Error
    Error(ErrorResponse),
}

/// Standardisierte Fehler-Antwort
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
    /// Optionale maschinenlesbare Details
    pub details: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Signal-Frame (Umschlag fuer alle Nachrichten)
// ---------------------------------------------------------------------------

/// Signaling-Nachricht mit Request/Response-Zuordnung
///
/// Jede Anfrage traegt eine `request_id` die der Client vergibt.
/// Der Server kopiert die ID in die Antwort damit der Client Request
/// und Response zuordnen kann. Benachrichtigungen verwenden die ID 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalMessage {
    /// Eindeutige Nachrichten-ID fuer Request/Response-Zuordnung
    pub request_id: u32,
    /// Inhalt der Nachricht
    pub payload: SignalPayload,
}

impl SignalMessage {
    /// Request-ID fuer Server-Benachrichtigungen
    pub const NOTIFICATION_ID: u32 = 0;

    /// Erstellt eine neue Signaling-Nachricht
    pub fn new(request_id: u32, payload: SignalPayload) -> Self {
        Self {
            request_id,
            payload,
        }
    }

    /// Erstellt eine Server-Benachrichtigung (request_id = 0)
    pub fn notification(payload: SignalPayload) -> Self {
        Self::new(Self::NOTIFICATION_ID, payload)
    }

    /// Erstellt eine Ping-Nachricht
    pub fn ping(request_id: u32, timestamp_ms: u64) -> Self {
        Self::new(request_id, SignalPayload::Ping(PingMessage { timestamp_ms }))
    }

    /// Erstellt eine Pong-Antwort
    pub fn pong(request_id: u32, echo_timestamp_ms: u64, server_timestamp_ms: u64) -> Self {
        Self::new(
            request_id,
            SignalPayload::Pong(PongMessage {
                echo_timestamp_ms,
                server_timestamp_ms,
            }),
        )
    }

    /// Erstellt eine Fehler-Antwort
    pub fn error(request_id: u32, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(
            request_id,
            SignalPayload::Error(ErrorResponse {
                code,
                message: message.into(),
                details: None,
            }),
        )
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert eine Nachricht aus JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtp::{DtlsFingerprint, DtlsRolle, RtpCapabilities};

    #[test]
    fn ping_pong_serialisierung() {
        let ping = SignalMessage::ping(1, 1234567890);
        let json = ping.to_json().unwrap();
        let decoded = SignalMessage::from_json(&json).unwrap();
        assert_eq!(decoded.request_id, 1);
        if let SignalPayload::Ping(p) = decoded.payload {
            assert_eq!(p.timestamp_ms, 1234567890);
        } else {
            panic!("Erwartet Ping-Payload");
        }
    }

    #[test]
    fn error_response_serialisierung() {
        let msg = SignalMessage::error(42, ErrorCode::NotConsumable, "Codec nicht unterstuetzt");
        let json = msg.to_json().unwrap();
        let decoded = SignalMessage::from_json(&json).unwrap();
        assert_eq!(decoded.request_id, 42);
        if let SignalPayload::Error(e) = decoded.payload {
            assert_eq!(e.code, ErrorCode::NotConsumable);
            assert_eq!(e.message, "Codec nicht unterstuetzt");
        } else {
            panic!("Erwartet Error-Payload");
        }
    }

    #[test]
    fn create_room_request_serialisierung() {
        let msg = SignalMessage::new(10, SignalPayload::CreateRoom);
        let json = msg.to_json().unwrap();
        let decoded = SignalMessage::from_json(&json).unwrap();
        assert_eq!(decoded.request_id, 10);
        assert!(matches!(decoded.payload, SignalPayload::CreateRoom));
    }

    #[test]
    fn create_transport_serialisierung() {
        let req = SignalMessage::new(
            5,
            SignalPayload::CreateTransport(CreateTransportRequest {
                direction: TransportRichtung::Senden,
            }),
        );
        let json = req.to_json().unwrap();
        let decoded = SignalMessage::from_json(&json).unwrap();
        if let SignalPayload::CreateTransport(t) = decoded.payload {
            assert_eq!(t.direction, TransportRichtung::Senden);
        } else {
            panic!("Erwartet CreateTransport-Payload");
        }
    }

    #[test]
    fn publish_request_serialisierung() {
        let req = SignalMessage::new(
            7,
            SignalPayload::Publish(PublishRequest {
                kind: MediaKind::Video,
                rtp_params: RtpParams {
                    mime_type: "video/VP8".to_string(),
                    clock_rate: 90_000,
                    payload_type: 96,
                    ssrc: 42,
                },
                correlation_tag: CorrelationTag::new("cam-1"),
            }),
        );
        let json = req.to_json().unwrap();
        let decoded = SignalMessage::from_json(&json).unwrap();
        if let SignalPayload::Publish(p) = decoded.payload {
            assert_eq!(p.kind, MediaKind::Video);
            assert_eq!(p.correlation_tag.as_str(), "cam-1");
        } else {
            panic!("Erwartet Publish-Payload");
        }
    }

    #[test]
    fn subscribe_request_serialisierung() {
        let pid = ProducerId::new();
        let req = SignalMessage::new(
            8,
            SignalPayload::Subscribe(SubscribeRequest {
                producer_id: pid,
                rtp_capabilities: RtpCapabilities::standard(),
            }),
        );
        let json = req.to_json().unwrap();
        let decoded = SignalMessage::from_json(&json).unwrap();
        if let SignalPayload::Subscribe(s) = decoded.payload {
            assert_eq!(s.producer_id, pid);
            assert_eq!(s.rtp_capabilities.codecs.len(), 2);
        } else {
            panic!("Erwartet Subscribe-Payload");
        }
    }

    #[test]
    fn connect_transport_serialisierung() {
        let req = SignalMessage::new(
            9,
            SignalPayload::ConnectTransport(ConnectTransportRequest {
                direction: TransportRichtung::Empfangen,
                dtls_params: DtlsParams {
                    role: DtlsRolle::Client,
                    fingerprints: vec![DtlsFingerprint {
                        algorithm: "sha-256".to_string(),
                        value: "AA:BB:CC".to_string(),
                    }],
                },
            }),
        );
        let json = req.to_json().unwrap();
        let decoded = SignalMessage::from_json(&json).unwrap();
        if let SignalPayload::ConnectTransport(c) = decoded.payload {
            assert_eq!(c.direction, TransportRichtung::Empfangen);
            assert_eq!(c.dtls_params.fingerprints.len(), 1);
        } else {
            panic!("Erwartet ConnectTransport-Payload");
        }
    }

    #[test]
    fn notification_hat_request_id_null() {
        let msg = SignalMessage::notification(SignalPayload::ProducerRemoved(
            ProducerRemovedNotification {
                correlation_tag: CorrelationTag::new("t1"),
            },
        ));
        assert_eq!(msg.request_id, SignalMessage::NOTIFICATION_ID);
    }

    #[test]
    fn error_codes_serialisierbar() {
        let codes = [
            ErrorCode::InternalError,
            ErrorCode::TransportNotFound,
            ErrorCode::TransportNotReady,
            ErrorCode::NotConsumable,
            ErrorCode::ProducerNotFound,
            ErrorCode::EngineFailure,
        ];
        for code in &codes {
            let json = serde_json::to_string(code).unwrap();
            let decoded: ErrorCode = serde_json::from_str(&json).unwrap();
            assert_eq!(*code, decoded);
        }
    }
}
