//! Event-Broadcaster – Verteilt Benachrichtigungen an Teilnehmer
//!
//! Der EventBroadcaster verwaltet die Send-Queues aller verbundenen
//! Teilnehmer. Benachrichtigungen gehen an alle ausser den Ausloeser;
//! die Zustellung ist best-effort: ein voller oder geschlossener
//! Empfaenger verhindert die Zustellung an die uebrigen nicht und
//! schlaegt nie auf die ausloesende Anfrage zurueck.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use huddle_core::types::{CorrelationTag, ParticipantId, ProducerId};
use huddle_protocol::rtp::MediaKind;
use huddle_protocol::signal::{
    ProducerAddedNotification, ProducerRemovedNotification, SignalMessage, SignalPayload,
};

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Groesse der Send-Queue pro Teilnehmer
const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue eines verbundenen Teilnehmers
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub teilnehmer: ParticipantId,
    pub tx: mpsc::Sender<SignalMessage>,
}

impl ClientSender {
    /// Sendet eine Nachricht nicht-blockierend an den Teilnehmer
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, nachricht: SignalMessage) -> bool {
        match self.tx.try_send(nachricht) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(teilnehmer = %self.teilnehmer, "Send-Queue voll, Nachricht verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(teilnehmer = %self.teilnehmer, "Send-Queue geschlossen (Teilnehmer getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Zentraler Event-Broadcaster fuer alle verbundenen Teilnehmer
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct EventBroadcaster {
    inner: Arc<EventBroadcasterInner>,
}

struct EventBroadcasterInner {
    /// Teilnehmer-Sender, indiziert nach ParticipantId
    teilnehmer: DashMap<ParticipantId, ClientSender>,
}

impl EventBroadcaster {
    /// Erstellt einen neuen EventBroadcaster
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(EventBroadcasterInner {
                teilnehmer: DashMap::new(),
            }),
        }
    }

    /// Registriert einen Teilnehmer und gibt seine Empfangs-Queue zurueck
    ///
    /// Die `ClientConnection` liest aus dieser Queue und sendet via TCP.
    pub fn teilnehmer_registrieren(
        &self,
        teilnehmer: ParticipantId,
    ) -> mpsc::Receiver<SignalMessage> {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        let sender = ClientSender { teilnehmer, tx };
        self.inner.teilnehmer.insert(teilnehmer, sender);
        tracing::debug!(teilnehmer = %teilnehmer, "Teilnehmer im Broadcaster registriert");
        rx
    }

    /// Entfernt einen Teilnehmer aus dem Broadcaster
    pub fn teilnehmer_entfernen(&self, teilnehmer: &ParticipantId) {
        self.inner.teilnehmer.remove(teilnehmer);
        tracing::debug!(teilnehmer = %teilnehmer, "Teilnehmer aus Broadcaster entfernt");
    }

    /// Sendet eine Nachricht an einen einzelnen Teilnehmer
    ///
    /// Gibt `true` zurueck wenn der Teilnehmer gefunden und die
    /// Nachricht eingereiht wurde.
    pub fn an_teilnehmer_senden(
        &self,
        teilnehmer: &ParticipantId,
        nachricht: SignalMessage,
    ) -> bool {
        match self.inner.teilnehmer.get(teilnehmer) {
            Some(sender) => sender.senden(nachricht),
            None => {
                tracing::debug!(teilnehmer = %teilnehmer, "Senden an unbekannten Teilnehmer");
                false
            }
        }
    }

    /// Sendet eine Nachricht an alle verbundenen Teilnehmer
    ///
    /// Gibt die Anzahl der erfolgreichen Sendungen zurueck.
    pub fn an_alle_senden(&self, nachricht: SignalMessage) -> usize {
        let mut gesendet = 0;
        self.inner.teilnehmer.iter().for_each(|eintrag| {
            if eintrag.value().senden(nachricht.clone()) {
                gesendet += 1;
            }
        });
        gesendet
    }

    /// Sendet eine Nachricht an alle verbundenen Teilnehmer ausser einem
    ///
    /// Der Ausloeser einer Aenderung erfaehrt von ihr ueber seine eigene
    /// Antwort, nicht ueber die Benachrichtigung.
    pub fn an_alle_ausser_senden(
        &self,
        ausgeschlossen: &ParticipantId,
        nachricht: SignalMessage,
    ) -> usize {
        let mut gesendet = 0;
        self.inner.teilnehmer.iter().for_each(|eintrag| {
            if eintrag.key() == ausgeschlossen {
                return;
            }
            if eintrag.value().senden(nachricht.clone()) {
                gesendet += 1;
            }
        });
        gesendet
    }

    /// Kuendigt einen neuen Produzenten bei allen anderen Teilnehmern an
    pub fn veroeffentlichung_ankuendigen(
        &self,
        ausloeser: &ParticipantId,
        producer_id: ProducerId,
        kind: MediaKind,
    ) -> usize {
        let nachricht = SignalMessage::notification(SignalPayload::ProducerAdded(
            ProducerAddedNotification { producer_id, kind },
        ));
        self.an_alle_ausser_senden(ausloeser, nachricht)
    }

    /// Kuendigt das Verschwinden einer Quelle bei allen anderen an
    ///
    /// Adressiert ueber das Korrelations-Tag damit Empfaenger Audio-
    /// und Video-Konsumenten der Quelle gemeinsam abraeumen.
    pub fn entfernung_ankuendigen(
        &self,
        ausloeser: &ParticipantId,
        correlation_tag: CorrelationTag,
    ) -> usize {
        let nachricht = SignalMessage::notification(SignalPayload::ProducerRemoved(
            ProducerRemovedNotification { correlation_tag },
        ));
        self.an_alle_ausser_senden(ausloeser, nachricht)
    }

    /// Gibt die Anzahl der registrierten Teilnehmer zurueck
    pub fn anzahl(&self) -> usize {
        self.inner.teilnehmer.len()
    }

    /// Prueft ob ein Teilnehmer registriert ist
    pub fn ist_registriert(&self, teilnehmer: &ParticipantId) -> bool {
        self.inner.teilnehmer.contains_key(teilnehmer)
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
