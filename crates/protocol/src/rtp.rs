//! Medien-Parameter-Typen
//!
//! Typisierte RTP-, DTLS- und ICE-Parameter die zwischen Client, Server
//! und Media-Engine ausgetauscht werden. Die Negotiation selbst (Codec-
//! Matching, ICE, DTLS-Handshake) ist Sache der Media-Engine, diese
//! Typen transportieren nur die ausgehandelten Werte.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Medien-Art und Transport-Richtung
// ---------------------------------------------------------------------------

/// Art eines Medien-Flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Richtung eines Transports aus Sicht des Teilnehmers
///
/// Jeder Teilnehmer besitzt hoechstens einen Transport pro Richtung.
/// Der Empfangs-Transport wird von allen Abonnements des Teilnehmers
/// gemeinsam genutzt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportRichtung {
    /// Teilnehmer -> Engine (veroeffentlichen)
    Senden,
    /// Engine -> Teilnehmer (abonnieren)
    Empfangen,
}

impl std::fmt::Display for TransportRichtung {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Senden => write!(f, "send"),
            Self::Empfangen => write!(f, "recv"),
        }
    }
}

// ---------------------------------------------------------------------------
// Codec-Profile und Faehigkeiten
// ---------------------------------------------------------------------------

/// Ein Codec-Profil im Faehigkeiten-Satz des Raums
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecProfile {
    pub kind: MediaKind,
    /// MIME-Typ, z.B. "audio/opus" oder "video/VP8"
    pub mime_type: String,
    /// Taktrate in Hz
    pub clock_rate: u32,
    /// Kanalanzahl (nur Audio)
    pub channels: Option<u8>,
    /// Codec-spezifische Parameter (z.B. Start-Bitrate)
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl CodecProfile {
    /// Standard-Audio-Profil: Opus, 48 kHz, Stereo
    pub fn opus_standard() -> Self {
        Self {
            kind: MediaKind::Audio,
            mime_type: "audio/opus".to_string(),
            clock_rate: 48_000,
            channels: Some(2),
            parameters: BTreeMap::new(),
        }
    }

    /// Standard-Video-Profil: VP8, 90 kHz
    pub fn vp8_standard() -> Self {
        Self {
            kind: MediaKind::Video,
            mime_type: "video/VP8".to_string(),
            clock_rate: 90_000,
            channels: None,
            parameters: BTreeMap::from([(
                "x-google-start-bitrate".to_string(),
                "1000".to_string(),
            )]),
        }
    }

    /// Prueft ob zwei Profile zueinander kompatibel sind
    ///
    /// Kompatibel heisst: gleiche Art, gleicher MIME-Typ (case-insensitiv)
    /// und gleiche Taktrate.
    pub fn ist_kompatibel(&self, anderes: &CodecProfile) -> bool {
        self.kind == anderes.kind
            && self.mime_type.eq_ignore_ascii_case(&anderes.mime_type)
            && self.clock_rate == anderes.clock_rate
    }
}

/// Faehigkeiten-Satz: welche Codecs ein Endpunkt verarbeiten kann
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtpCapabilities {
    pub codecs: Vec<CodecProfile>,
}

impl RtpCapabilities {
    /// Der feste Faehigkeiten-Satz des Raums: ein Audio-, ein Video-Profil
    pub fn standard() -> Self {
        Self {
            codecs: vec![CodecProfile::opus_standard(), CodecProfile::vp8_standard()],
        }
    }

    /// Prueft ob diese Faehigkeiten ein bestimmtes Profil abdecken
    pub fn unterstuetzt(&self, profil: &CodecProfile) -> bool {
        self.codecs.iter().any(|c| c.ist_kompatibel(profil))
    }
}

// ---------------------------------------------------------------------------
// RTP-Parameter eines einzelnen Flows
// ---------------------------------------------------------------------------

/// Ausgehandelte RTP-Parameter eines Produzenten oder Konsumenten
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtpParams {
    /// MIME-Typ des verwendeten Codecs
    pub mime_type: String,
    /// Taktrate in Hz
    pub clock_rate: u32,
    /// Dynamischer Payload-Typ
    pub payload_type: u8,
    /// SSRC des Flows
    pub ssrc: u32,
}

impl RtpParams {
    /// Leitet das Codec-Profil aus den Parametern ab
    pub fn als_profil(&self, kind: MediaKind) -> CodecProfile {
        CodecProfile {
            kind,
            mime_type: self.mime_type.clone(),
            clock_rate: self.clock_rate,
            channels: None,
            parameters: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// DTLS- und ICE-Parameter
// ---------------------------------------------------------------------------

/// DTLS-Rolle im Handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DtlsRolle {
    Auto,
    Client,
    Server,
}

/// Ein DTLS-Fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtlsFingerprint {
    /// Hash-Algorithmus, z.B. "sha-256"
    pub algorithm: String,
    /// Fingerprint-Wert in Hex-Doppelpunkt-Notation
    pub value: String,
}

/// DTLS-Parameter einer Transport-Seite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtlsParams {
    pub role: DtlsRolle,
    pub fingerprints: Vec<DtlsFingerprint>,
}

/// ICE-Parameter (Kurzform, ohne Trickle-Support)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceParams {
    pub username_fragment: String,
    pub password: String,
}

/// Ein ICE-Kandidat des Servers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub foundation: String,
    pub ip: String,
    pub port: u16,
    /// "udp" oder "tcp"
    pub protocol: String,
    pub priority: u32,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
