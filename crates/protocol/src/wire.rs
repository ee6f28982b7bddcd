//! Wire-Format fuer den Signaling-Kanal
//!
//! Frame-basiertes Protokoll: Length(u32 big-endian) + JSON-Payload.
//!
//! ## Frame-Format
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE) | 4 Bytes        | Payload    |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! Die Laenge gibt die Anzahl der Payload-Bytes an (ohne die 4 Laengen-Bytes).
//! Maximale Frame-Groesse ist konfigurierbar (Standard: 256 KB). Grosse
//! Frames deuten auf einen defekten Client und werden abgelehnt.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::signal::SignalMessage;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (256 KB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 256 * 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer den frame-basierten Signaling-Kanal
///
/// Implementiert `Encoder<SignalMessage>` und `Decoder` fuer nahtlose
/// Integration mit `tokio_util::codec::Framed`.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Maximale erlaubte Frame-Groesse in Bytes
    max_frame_size: usize,
}

impl FrameCodec {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Erstellt einen `FrameCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Gibt die konfigurierte maximale Frame-Groesse zurueck
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Decoder-Implementierung
// ---------------------------------------------------------------------------

impl Decoder for FrameCodec {
    type Item = SignalMessage;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Warte auf mindestens 4 Bytes fuer das Laengen-Feld
        if src.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }

        // Laenge lesen (big-endian u32) ohne den Buffer zu veraendern
        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

        // Maximale Frame-Groesse pruefen
        if length > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Frame zu gross: {} Bytes (Maximum: {} Bytes)",
                    length, self.max_frame_size
                ),
            ));
        }

        // Pruefen ob der vollstaendige Frame bereits im Buffer ist
        let total_size = LENGTH_FIELD_SIZE + length;
        if src.len() < total_size {
            // Speicher vorbelegen um Reallocations zu vermeiden
            src.reserve(total_size - src.len());
            return Ok(None);
        }

        // Laengen-Feld verbrauchen
        src.advance(LENGTH_FIELD_SIZE);

        // Payload-Bytes extrahieren
        let payload = src.split_to(length);

        // JSON deserialisieren
        let message: SignalMessage = serde_json::from_slice(&payload).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON-Deserialisierung fehlgeschlagen: {}", e),
            )
        })?;

        Ok(Some(message))
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierung
// ---------------------------------------------------------------------------

impl Encoder<SignalMessage> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: SignalMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        // JSON serialisieren
        let json = serde_json::to_vec(&item).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON-Serialisierung fehlgeschlagen: {}", e),
            )
        })?;

        // Groesse pruefen
        if json.len() > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Nachricht zu gross: {} Bytes (Maximum: {} Bytes)",
                    json.len(),
                    self.max_frame_size
                ),
            ));
        }

        // Laengen-Feld + Payload schreiben
        dst.reserve(LENGTH_FIELD_SIZE + json.len());
        dst.put_u32(json.len() as u32);
        dst.put_slice(&json);

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalPayload;
    use tokio_util::codec::{Decoder, Encoder};

    fn test_ping_nachricht(request_id: u32) -> SignalMessage {
        SignalMessage::ping(request_id, 999888777)
    }

    #[test]
    fn frame_codec_encode_decode_round_trip() {
        let mut codec = FrameCodec::new();
        let original = test_ping_nachricht(42);

        // Kodieren
        let mut buf = BytesMut::new();
        codec.encode(original.clone(), &mut buf).unwrap();

        // Laengen-Feld pruefen
        let payload_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert!(payload_len > 0);
        assert_eq!(buf.len(), LENGTH_FIELD_SIZE + payload_len);

        // Dekodieren
        let decoded = codec
            .decode(&mut buf)
            .unwrap()
            .expect("Muss eine Nachricht enthalten");
        assert_eq!(decoded.request_id, 42);
        assert!(matches!(decoded.payload, SignalPayload::Ping(_)));
    }

    #[test]
    fn frame_codec_unvollstaendiger_frame() {
        let mut codec = FrameCodec::new();
        let original = test_ping_nachricht(1);

        let mut buf = BytesMut::new();
        codec.encode(original, &mut buf).unwrap();

        // Nur die Haelfte der Bytes behalten
        let half = buf.len() / 2;
        let mut partial = buf.split_to(half);

        // Sollte None zurueckgeben (wartet auf mehr Daten)
        let result = codec.decode(&mut partial).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn frame_codec_zu_wenig_bytes_fuer_laengenfeld() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[0x00, 0x00][..]);
        let result = codec.decode(&mut buf).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn frame_codec_ablehnung_zu_grosser_frame() {
        let mut codec = FrameCodec::with_max_size(100);

        // Frame-Laenge von 200 Bytes im Buffer simulieren
        let mut buf = BytesMut::new();
        buf.put_u32(200); // 200 Bytes Payload
        buf.put_slice(&[b'x'; 200]);

        let result = codec.decode(&mut buf);
        assert!(result.is_err());
    }

    #[test]
    fn frame_codec_ablehnung_beim_encode_zu_grosse_nachricht() {
        // Kleines Limit setzen
        let mut codec = FrameCodec::with_max_size(10);
        let original = test_ping_nachricht(1); // JSON ist sicher > 10 Bytes

        let mut buf = BytesMut::new();
        let result = codec.encode(original, &mut buf);
        assert!(result.is_err());
    }

    #[test]
    fn frame_codec_mehrere_nachrichten_im_buffer() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        // Drei Nachrichten kodieren
        for i in 0..3u32 {
            codec.encode(test_ping_nachricht(i), &mut buf).unwrap();
        }

        // Alle drei dekodieren
        for i in 0..3u32 {
            let msg = codec.decode(&mut buf).unwrap().expect("Nachricht erwartet");
            assert_eq!(msg.request_id, i);
        }

        // Buffer muss leer sein
        assert!(buf.is_empty());
    }
}
