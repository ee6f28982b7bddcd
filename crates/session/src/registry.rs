//! Raum-Registry – Lazy Raum-Erstellung mit genau einem Gewinner
//!
//! Der Raum existiert erst wenn der erste Teilnehmer ihn anfordert.
//! Fordern mehrere Teilnehmer gleichzeitig an, erstellt genau einer den
//! Routing-Kontext in der Engine; alle anderen warten und bekommen
//! denselben Raum-Zustand zurueck. Dafuer sorgt eine `tokio::sync::OnceCell`
//! pro Raum: `get_or_try_init` serialisiert die Initialisierung, ohne
//! waehrenddessen einen globalen Lock zu halten.
//!
//! Schlaegt die Engine-Erstellung fehl, bleibt die Zelle leer und der
//! naechste Anforderer versucht es erneut.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use huddle_core::types::RoomId;
use huddle_media::{KontextId, MediaEngine};
use huddle_protocol::rtp::RtpCapabilities;

use crate::error::SessionResult;

/// Zustand eines erstellten Raums
#[derive(Debug, Clone)]
pub struct RaumZustand {
    pub raum_id: RoomId,
    /// Engine-Handle des Routing-Kontexts
    pub kontext_id: KontextId,
    /// Fester Faehigkeiten-Satz des Raums
    pub faehigkeiten: RtpCapabilities,
}

struct RoomRegistryInner {
    engine: Arc<dyn MediaEngine>,
    raeume: DashMap<RoomId, Arc<OnceCell<RaumZustand>>>,
    /// Der eine Raum dieses Servers
    standard_raum: RoomId,
}

/// Raum-Registry
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct RoomRegistry {
    inner: Arc<RoomRegistryInner>,
}

impl RoomRegistry {
    /// Erstellt eine neue Registry (noch ohne Raum)
    pub fn neu(engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            inner: Arc::new(RoomRegistryInner {
                engine,
                raeume: DashMap::new(),
                standard_raum: RoomId::new(),
            }),
        }
    }

    /// Die RoomId des (einzigen) Raums dieses Servers
    pub fn standard_raum(&self) -> RoomId {
        self.inner.standard_raum
    }

    /// Stellt sicher dass der Raum existiert und gibt seinen Zustand zurueck
    ///
    /// Erster Aufrufer erstellt den Routing-Kontext, alle weiteren
    /// bekommen denselben Zustand. Idempotent.
    pub async fn raum_sicherstellen(&self) -> SessionResult<RaumZustand> {
        let raum_id = self.inner.standard_raum;
        let zelle = self
            .inner
            .raeume
            .entry(raum_id)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let zustand = zelle
            .get_or_try_init(|| async {
                let codecs = RtpCapabilities::standard().codecs;
                let kontext = self.inner.engine.routing_kontext_erstellen(&codecs).await?;
                info!(
                    raum_id = %raum_id,
                    kontext_id = %kontext.kontext_id,
                    "Raum erstellt"
                );
                Ok::<_, crate::error::SessionError>(RaumZustand {
                    raum_id,
                    kontext_id: kontext.kontext_id,
                    faehigkeiten: kontext.faehigkeiten,
                })
            })
            .await?;

        debug!(raum_id = %raum_id, "Raum angefordert");
        Ok(zustand.clone())
    }

    /// Prueft ob der Raum bereits erstellt wurde
    pub fn raum_existiert(&self) -> bool {
        self.inner
            .raeume
            .get(&self.inner.standard_raum)
            .map(|zelle| zelle.initialized())
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_media::LoopbackEngine;

    #[tokio::test]
    async fn raum_wird_lazy_erstellt() {
        let engine = LoopbackEngine::neu();
        let registry = RoomRegistry::neu(Arc::new(engine.clone()));

        assert!(!registry.raum_existiert());
        assert_eq!(engine.anzahl_kontexte(), 0);

        let zustand = registry.raum_sicherstellen().await.unwrap();
        assert!(registry.raum_existiert());
        assert_eq!(engine.anzahl_kontexte(), 1);
        assert_eq!(zustand.faehigkeiten.codecs.len(), 2);
    }

    #[tokio::test]
    async fn zweiter_aufrufer_bekommt_denselben_raum() {
        let engine = LoopbackEngine::neu();
        let registry = RoomRegistry::neu(Arc::new(engine.clone()));

        let a = registry.raum_sicherstellen().await.unwrap();
        let b = registry.raum_sicherstellen().await.unwrap();

        assert_eq!(a.kontext_id, b.kontext_id);
        assert_eq!(engine.anzahl_kontexte(), 1);
    }

    #[tokio::test]
    async fn gleichzeitige_anforderung_erstellt_genau_einen_raum() {
        let engine = LoopbackEngine::neu();
        let registry = RoomRegistry::neu(Arc::new(engine.clone()));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let r = registry.clone();
                tokio::spawn(async move { r.raum_sicherstellen().await.unwrap().kontext_id })
            })
            .collect();

        let mut kontexte = Vec::new();
        for t in tasks {
            kontexte.push(t.await.unwrap());
        }

        assert_eq!(engine.anzahl_kontexte(), 1);
        assert!(kontexte.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn fehlgeschlagene_erstellung_bleibt_wiederholbar() {
        let engine = LoopbackEngine::neu();
        let registry = RoomRegistry::neu(Arc::new(engine.clone()));

        engine.ausfall_ausloesen("Testausfall");
        assert!(registry.raum_sicherstellen().await.is_err());
        assert!(!registry.raum_existiert());
    }
}
