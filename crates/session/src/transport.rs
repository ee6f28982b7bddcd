//! Transport-Koordinator – Ein Transport pro Teilnehmer und Richtung
//!
//! Jeder Teilnehmer besitzt hoechstens einen Sende- und einen
//! Empfangs-Transport. Gleichzeitige Anforderungen derselben Richtung
//! erstellen genau einen Engine-Transport (OnceCell pro Schluessel);
//! jede weitere Anforderung bekommt dieselben Verbindungsparameter
//! zurueck, fuer den Client ununterscheidbar von der Neuanlage.
//!
//! ## Connect-Idempotenz
//! `verbinden` ueberquert die Engine-Grenze genau einmal pro Transport.
//! Das Verbunden-Flag wird atomar gesetzt bevor die Engine gerufen wird;
//! schlaegt der Engine-Aufruf fehl, wird das Flag zurueckgesetzt damit
//! ein erneuter Versuch moeglich bleibt.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use huddle_core::types::{ParticipantId, TransportId};
use huddle_media::{MediaEngine, TransportBeschreibung};
use huddle_protocol::rtp::{DtlsParams, TransportRichtung};

use crate::error::{SessionError, SessionResult};
use crate::registry::RoomRegistry;

/// Ein erstellter Transport samt Verbindungszustand
struct TransportEintrag {
    beschreibung: TransportBeschreibung,
    verbunden: AtomicBool,
}

struct TransportCoordinatorInner {
    engine: Arc<dyn MediaEngine>,
    registry: RoomRegistry,
    /// Ein Eintrag pro (Teilnehmer, Richtung)
    eintraege: DashMap<(ParticipantId, TransportRichtung), Arc<OnceCell<TransportEintrag>>>,
    /// Rueckwaerts-Index fuer Engine-Ereignisse
    nach_transport: DashMap<TransportId, (ParticipantId, TransportRichtung)>,
}

/// Transport-Koordinator
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct TransportCoordinator {
    inner: Arc<TransportCoordinatorInner>,
}

impl TransportCoordinator {
    /// Erstellt einen neuen TransportCoordinator
    pub fn neu(engine: Arc<dyn MediaEngine>, registry: RoomRegistry) -> Self {
        Self {
            inner: Arc::new(TransportCoordinatorInner {
                engine,
                registry,
                eintraege: DashMap::new(),
                nach_transport: DashMap::new(),
            }),
        }
    }

    /// Gibt den Transport des Teilnehmers in der Richtung zurueck,
    /// erstellt ihn bei Bedarf
    ///
    /// Stellt zuvor sicher dass der Raum existiert. Idempotent: jede
    /// weitere Anforderung liefert dieselben Verbindungsparameter.
    pub async fn holen_oder_erstellen(
        &self,
        teilnehmer: ParticipantId,
        richtung: TransportRichtung,
    ) -> SessionResult<TransportBeschreibung> {
        let raum = self.inner.registry.raum_sicherstellen().await?;

        let zelle = self
            .inner
            .eintraege
            .entry((teilnehmer, richtung))
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let eintrag = zelle
            .get_or_try_init(|| async {
                let beschreibung = self
                    .inner
                    .engine
                    .transport_erstellen(raum.kontext_id, richtung)
                    .await?;
                self.inner
                    .nach_transport
                    .insert(beschreibung.transport_id, (teilnehmer, richtung));
                info!(
                    teilnehmer = %teilnehmer,
                    transport_id = %beschreibung.transport_id,
                    %richtung,
                    "Transport erstellt"
                );
                Ok::<_, SessionError>(TransportEintrag {
                    beschreibung,
                    verbunden: AtomicBool::new(false),
                })
            })
            .await?;

        Ok(eintrag.beschreibung.clone())
    }

    /// Verbindet den Transport des Teilnehmers in der Richtung
    ///
    /// Gibt `true` zurueck wenn die Engine tatsaechlich verbunden hat,
    /// `false` beim No-op (bereits verbunden). Beides ist fuer den
    /// Client eine Erfolgs-Antwort.
    pub async fn verbinden(
        &self,
        teilnehmer: ParticipantId,
        richtung: TransportRichtung,
        dtls_params: DtlsParams,
    ) -> SessionResult<bool> {
        let zelle = self.eintrag(teilnehmer, richtung)?;
        let eintrag = zelle
            .get()
            .ok_or(SessionError::TransportNichtGefunden(richtung))?;

        // Flag atomar setzen: genau ein Aufrufer gewinnt
        if eintrag.verbunden.swap(true, Ordering::AcqRel) {
            debug!(
                teilnehmer = %teilnehmer,
                %richtung,
                "Transport bereits verbunden, No-op"
            );
            return Ok(false);
        }

        let transport_id = eintrag.beschreibung.transport_id;
        if let Err(e) = self
            .inner
            .engine
            .transport_verbinden(transport_id, dtls_params)
            .await
        {
            // Zuruecksetzen damit ein spaeterer Versuch moeglich bleibt
            eintrag.verbunden.store(false, Ordering::Release);
            warn!(
                teilnehmer = %teilnehmer,
                transport_id = %transport_id,
                fehler = %e,
                "Transport-Verbinden fehlgeschlagen"
            );
            return Err(e.into());
        }

        info!(teilnehmer = %teilnehmer, transport_id = %transport_id, %richtung, "Transport verbunden");
        Ok(true)
    }

    /// Prueft ob der Transport des Teilnehmers verbunden ist
    pub fn ist_verbunden(&self, teilnehmer: ParticipantId, richtung: TransportRichtung) -> bool {
        self.eintrag(teilnehmer, richtung)
            .ok()
            .and_then(|z| z.get().map(|e| e.verbunden.load(Ordering::Acquire)))
            .unwrap_or(false)
    }

    /// Gibt die TransportId des Teilnehmers in der Richtung zurueck
    pub fn transport_id(
        &self,
        teilnehmer: ParticipantId,
        richtung: TransportRichtung,
    ) -> Option<TransportId> {
        self.eintrag(teilnehmer, richtung)
            .ok()
            .and_then(|z| z.get().map(|e| e.beschreibung.transport_id))
    }

    /// Ordnet eine TransportId ihrem Besitzer zu (fuer Engine-Ereignisse)
    pub fn besitzer(&self, transport_id: TransportId) -> Option<(ParticipantId, TransportRichtung)> {
        self.inner.nach_transport.get(&transport_id).map(|e| *e)
    }

    /// Entfernt einen Transport nach einer engine-seitigen Schliessung
    pub fn nach_engine_schliessung_entfernen(&self, transport_id: TransportId) {
        if let Some((_, (teilnehmer, richtung))) = self.inner.nach_transport.remove(&transport_id) {
            self.inner.eintraege.remove(&(teilnehmer, richtung));
            debug!(%transport_id, teilnehmer = %teilnehmer, "Transport nach Engine-Schliessung entfernt");
        }
    }

    /// Schliesst und entfernt alle Transporte eines Teilnehmers
    ///
    /// Die Engine kaskadiert auf Produzenten und Konsumenten dieser
    /// Transporte. Gibt die geschlossenen TransportIds zurueck.
    pub async fn von_teilnehmer_entfernen(&self, teilnehmer: ParticipantId) -> Vec<TransportId> {
        let mut geschlossen = Vec::new();
        for richtung in [TransportRichtung::Senden, TransportRichtung::Empfangen] {
            let Some((_, zelle)) = self.inner.eintraege.remove(&(teilnehmer, richtung)) else {
                continue;
            };
            let Some(eintrag) = zelle.get() else {
                continue;
            };
            let transport_id = eintrag.beschreibung.transport_id;
            self.inner.nach_transport.remove(&transport_id);

            if let Err(e) = self.inner.engine.transport_schliessen(transport_id).await {
                warn!(
                    teilnehmer = %teilnehmer,
                    transport_id = %transport_id,
                    fehler = %e,
                    "Transport-Schliessen fehlgeschlagen"
                );
            }
            geschlossen.push(transport_id);
        }
        geschlossen
    }

    /// Anzahl aktuell verwalteter Transporte
    pub fn anzahl(&self) -> usize {
        self.inner.nach_transport.len()
    }

    fn eintrag(
        &self,
        teilnehmer: ParticipantId,
        richtung: TransportRichtung,
    ) -> SessionResult<Arc<OnceCell<TransportEintrag>>> {
        self.inner
            .eintraege
            .get(&(teilnehmer, richtung))
            .map(|z| z.clone())
            .filter(|z| z.initialized())
            .ok_or(SessionError::TransportNichtGefunden(richtung))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
