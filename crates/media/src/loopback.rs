//! Prozess-interne Media-Engine
//!
//! Implementiert `MediaEngine` vollstaendig im Prozess: kein Netzwerk,
//! keine echte Negotiation, aber dieselben Semantiken wie eine externe
//! Engine (Konsumenten starten pausiert, Schliessungen kaskadieren auf
//! abhaengige Flows, Ereignisse laufen ueber den broadcast-Kanal).
//!
//! Das Server-Binary startet mit dieser Engine; die Tests der
//! Session-Schicht beobachten ueber die Zaehl-Methoden wie oft der
//! Koordinator die Engine-Grenze tatsaechlich ueberquert.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use huddle_core::types::{ConsumerId, ProducerId, TransportId};
use huddle_protocol::rtp::{
    CodecProfile, DtlsFingerprint, DtlsParams, DtlsRolle, IceCandidate, IceParams, MediaKind,
    RtpCapabilities, RtpParams, TransportRichtung,
};

use crate::engine::{
    EngineEreignis, KonsumentBeschreibung, KontextId, MediaEngine, RoutingKontext,
    TransportBeschreibung,
};
use crate::error::{EngineError, EngineResult};

/// Kapazitaet des Ereignis-Kanals
const EREIGNIS_KANAL_GROESSE: usize = 256;

/// Netzwerk-Parameter fuer die generierten ICE-Kandidaten
#[derive(Debug, Clone)]
pub struct NetzwerkOptionen {
    /// In den Kandidaten angekuendigte IP
    pub angekuendigte_ip: String,
    /// Unteres Ende des RTC-Port-Bereichs
    pub rtc_port_min: u16,
    /// Oberes Ende des RTC-Port-Bereichs (inklusiv)
    pub rtc_port_max: u16,
}

impl Default for NetzwerkOptionen {
    fn default() -> Self {
        Self {
            angekuendigte_ip: "127.0.0.1".to_string(),
            rtc_port_min: 2000,
            rtc_port_max: 2020,
        }
    }
}

// ---------------------------------------------------------------------------
// Interner Zustand
// ---------------------------------------------------------------------------

struct TransportZustand {
    kontext_id: KontextId,
    richtung: TransportRichtung,
    verbunden: bool,
    /// Wie oft `transport_verbinden` fuer diesen Transport aufgerufen wurde
    verbindungen: u32,
}

struct ProduzentZustand {
    transport_id: TransportId,
    kind: MediaKind,
    rtp_params: RtpParams,
}

struct KonsumentZustand {
    transport_id: TransportId,
    producer_id: ProducerId,
    pausiert: bool,
}

struct Inner {
    netzwerk: NetzwerkOptionen,
    kontexte: DashMap<KontextId, RtpCapabilities>,
    transporte: DashMap<TransportId, TransportZustand>,
    produzenten: DashMap<ProducerId, ProduzentZustand>,
    konsumenten: DashMap<ConsumerId, KonsumentZustand>,
    ereignis_tx: broadcast::Sender<EngineEreignis>,
    /// Laufender Zaehler fuer SSRCs und Kandidaten-Ports
    laufnummer: AtomicU32,
    /// Nach einem Ausfall schlagen alle weiteren Aufrufe fehl
    ausgefallen: AtomicBool,
}

// ---------------------------------------------------------------------------
// LoopbackEngine
// ---------------------------------------------------------------------------

/// In-Prozess-Implementierung der `MediaEngine`
///
/// Clone teilt den Zustand.
#[derive(Clone)]
pub struct LoopbackEngine {
    inner: Arc<Inner>,
}

impl LoopbackEngine {
    /// Erstellt eine neue LoopbackEngine mit Standard-Netzwerkparametern
    pub fn neu() -> Self {
        Self::mit_netzwerk(NetzwerkOptionen::default())
    }

    /// Erstellt eine LoopbackEngine mit den gegebenen Netzwerkparametern
    ///
    /// Angekuendigte IP und Port-Bereich landen in den generierten
    /// ICE-Kandidaten.
    pub fn mit_netzwerk(netzwerk: NetzwerkOptionen) -> Self {
        let (ereignis_tx, _) = broadcast::channel(EREIGNIS_KANAL_GROESSE);
        Self {
            inner: Arc::new(Inner {
                netzwerk,
                kontexte: DashMap::new(),
                transporte: DashMap::new(),
                produzenten: DashMap::new(),
                konsumenten: DashMap::new(),
                ereignis_tx,
                laufnummer: AtomicU32::new(0),
                ausgefallen: AtomicBool::new(false),
            }),
        }
    }

    fn pruefen(&self) -> EngineResult<()> {
        if self.inner.ausgefallen.load(Ordering::Acquire) {
            return Err(EngineError::Ausfall("Engine ist ausgefallen".to_string()));
        }
        Ok(())
    }

    fn naechste_nummer(&self) -> u32 {
        self.inner.laufnummer.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn senden(&self, ereignis: EngineEreignis) {
        // Fehler heisst nur: momentan kein Abonnent
        let _ = self.inner.ereignis_tx.send(ereignis);
    }

    /// Simuliert einen fatalen Engine-Ausfall
    ///
    /// Meldet das Ausfall-Ereignis und laesst alle weiteren Aufrufe mit
    /// `EngineError::Ausfall` fehlschlagen.
    pub fn ausfall_ausloesen(&self, grund: &str) {
        warn!(grund, "Engine-Ausfall ausgeloest");
        self.inner.ausgefallen.store(true, Ordering::Release);
        self.senden(EngineEreignis::Ausfall {
            grund: grund.to_string(),
        });
    }

    // -----------------------------------------------------------------------
    // Beobachtungs-Methoden fuer Tests
    // -----------------------------------------------------------------------

    /// Wie oft `transport_verbinden` fuer diesen Transport aufgerufen wurde
    pub fn verbindungs_zaehler(&self, transport_id: TransportId) -> u32 {
        self.inner
            .transporte
            .get(&transport_id)
            .map(|t| t.verbindungen)
            .unwrap_or(0)
    }

    /// Ob ein Konsument aktuell pausiert ist (None wenn unbekannt)
    pub fn ist_pausiert(&self, consumer_id: ConsumerId) -> Option<bool> {
        self.inner.konsumenten.get(&consumer_id).map(|k| k.pausiert)
    }

    /// Anzahl erstellter Routing-Kontexte
    pub fn anzahl_kontexte(&self) -> usize {
        self.inner.kontexte.len()
    }

    /// Anzahl aktuell offener Transporte
    pub fn anzahl_transporte(&self) -> usize {
        self.inner.transporte.len()
    }

    /// Anzahl aktuell offener Produzenten
    pub fn anzahl_produzenten(&self) -> usize {
        self.inner.produzenten.len()
    }

    /// Anzahl aktuell offener Konsumenten
    pub fn anzahl_konsumenten(&self) -> usize {
        self.inner.konsumenten.len()
    }

    // -----------------------------------------------------------------------
    // Kaskadierende Schliessung
    // -----------------------------------------------------------------------

    /// Schliesst einen Produzenten samt aller Konsumenten seines Flows
    fn produzent_schliessen(&self, producer_id: ProducerId) {
        if self.inner.produzenten.remove(&producer_id).is_none() {
            return;
        }
        let betroffene: Vec<ConsumerId> = self
            .inner
            .konsumenten
            .iter()
            .filter(|e| e.value().producer_id == producer_id)
            .map(|e| *e.key())
            .collect();
        for consumer_id in betroffene {
            self.konsument_schliessen(consumer_id);
        }
        self.senden(EngineEreignis::ProduzentGeschlossen { producer_id });
    }

    fn konsument_schliessen(&self, consumer_id: ConsumerId) {
        if self.inner.konsumenten.remove(&consumer_id).is_some() {
            self.senden(EngineEreignis::KonsumentGeschlossen { consumer_id });
        }
    }

    fn fake_transport(&self, richtung: TransportRichtung) -> TransportBeschreibung {
        let transport_id = TransportId::new();
        let nummer = self.naechste_nummer();
        let netzwerk = &self.inner.netzwerk;
        let obergrenze = netzwerk.rtc_port_max.max(netzwerk.rtc_port_min);
        let spanne = u32::from(obergrenze - netzwerk.rtc_port_min) + 1;
        let port = netzwerk.rtc_port_min + (nummer % spanne) as u16;
        TransportBeschreibung {
            transport_id,
            richtung,
            ice_params: IceParams {
                username_fragment: format!("huddle-{nummer:08x}"),
                password: format!("{:032x}", u128::from(nummer).wrapping_mul(0x9E37_79B9)),
            },
            ice_candidates: vec![IceCandidate {
                foundation: format!("loopback{nummer}"),
                ip: netzwerk.angekuendigte_ip.clone(),
                port,
                protocol: "udp".to_string(),
                priority: 100,
            }],
            dtls_params: DtlsParams {
                role: DtlsRolle::Auto,
                fingerprints: vec![DtlsFingerprint {
                    algorithm: "sha-256".to_string(),
                    value: format!("{:02X}:{:02X}:00:00", nummer & 0xFF, (nummer >> 8) & 0xFF),
                }],
            },
        }
    }
}

impl Default for LoopbackEngine {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// MediaEngine-Implementierung
// ---------------------------------------------------------------------------

#[async_trait]
impl MediaEngine for LoopbackEngine {
    async fn routing_kontext_erstellen(
        &self,
        codecs: &[CodecProfile],
    ) -> EngineResult<RoutingKontext> {
        self.pruefen()?;
        let kontext_id = KontextId::new();
        let faehigkeiten = RtpCapabilities {
            codecs: codecs.to_vec(),
        };
        self.inner.kontexte.insert(kontext_id, faehigkeiten.clone());
        debug!(%kontext_id, codecs = codecs.len(), "Routing-Kontext erstellt");
        Ok(RoutingKontext {
            kontext_id,
            faehigkeiten,
        })
    }

    async fn transport_erstellen(
        &self,
        kontext_id: KontextId,
        richtung: TransportRichtung,
    ) -> EngineResult<TransportBeschreibung> {
        self.pruefen()?;
        if !self.inner.kontexte.contains_key(&kontext_id) {
            return Err(EngineError::KontextNichtGefunden(kontext_id));
        }
        let beschreibung = self.fake_transport(richtung);
        self.inner.transporte.insert(
            beschreibung.transport_id,
            TransportZustand {
                kontext_id,
                richtung,
                verbunden: false,
                verbindungen: 0,
            },
        );
        debug!(transport_id = %beschreibung.transport_id, %richtung, "Transport erstellt");
        Ok(beschreibung)
    }

    async fn transport_verbinden(
        &self,
        transport_id: TransportId,
        _dtls_params: DtlsParams,
    ) -> EngineResult<()> {
        self.pruefen()?;
        let mut transport = self
            .inner
            .transporte
            .get_mut(&transport_id)
            .ok_or(EngineError::TransportNichtGefunden(transport_id))?;
        transport.verbunden = true;
        transport.verbindungen += 1;
        debug!(%transport_id, "Transport verbunden");
        Ok(())
    }

    async fn transport_schliessen(&self, transport_id: TransportId) -> EngineResult<()> {
        self.pruefen()?;
        if self.inner.transporte.remove(&transport_id).is_none() {
            // Doppelte Schliessung ist harmlos
            return Ok(());
        }
        let produzenten: Vec<ProducerId> = self
            .inner
            .produzenten
            .iter()
            .filter(|e| e.value().transport_id == transport_id)
            .map(|e| *e.key())
            .collect();
        for producer_id in produzenten {
            self.produzent_schliessen(producer_id);
        }
        let konsumenten: Vec<ConsumerId> = self
            .inner
            .konsumenten
            .iter()
            .filter(|e| e.value().transport_id == transport_id)
            .map(|e| *e.key())
            .collect();
        for consumer_id in konsumenten {
            self.konsument_schliessen(consumer_id);
        }
        self.senden(EngineEreignis::TransportGeschlossen { transport_id });
        debug!(%transport_id, "Transport geschlossen");
        Ok(())
    }

    async fn produzieren(
        &self,
        transport_id: TransportId,
        kind: MediaKind,
        rtp_params: RtpParams,
    ) -> EngineResult<ProducerId> {
        self.pruefen()?;
        {
            let transport = self
                .inner
                .transporte
                .get(&transport_id)
                .ok_or(EngineError::TransportNichtGefunden(transport_id))?;
            if transport.richtung != TransportRichtung::Senden {
                return Err(EngineError::TransportNichtGefunden(transport_id));
            }
        }
        let producer_id = ProducerId::new();
        self.inner.produzenten.insert(
            producer_id,
            ProduzentZustand {
                transport_id,
                kind,
                rtp_params,
            },
        );
        debug!(%producer_id, %transport_id, %kind, "Produzent erstellt");
        Ok(producer_id)
    }

    async fn kann_konsumieren(
        &self,
        producer_id: ProducerId,
        faehigkeiten: &RtpCapabilities,
    ) -> bool {
        if self.inner.ausgefallen.load(Ordering::Acquire) {
            return false;
        }
        let Some(produzent) = self.inner.produzenten.get(&producer_id) else {
            return false;
        };
        let profil = produzent.rtp_params.als_profil(produzent.kind);
        faehigkeiten.unterstuetzt(&profil)
    }

    async fn konsumieren(
        &self,
        transport_id: TransportId,
        producer_id: ProducerId,
        faehigkeiten: &RtpCapabilities,
    ) -> EngineResult<KonsumentBeschreibung> {
        self.pruefen()?;
        {
            let transport = self
                .inner
                .transporte
                .get(&transport_id)
                .ok_or(EngineError::TransportNichtGefunden(transport_id))?;
            if transport.richtung != TransportRichtung::Empfangen {
                return Err(EngineError::TransportNichtGefunden(transport_id));
            }
        }
        let (kind, mut rtp_params) = {
            let produzent = self
                .inner
                .produzenten
                .get(&producer_id)
                .ok_or(EngineError::ProduzentNichtGefunden(producer_id))?;
            (produzent.kind, produzent.rtp_params.clone())
        };
        if !self.kann_konsumieren(producer_id, faehigkeiten).await {
            return Err(EngineError::NichtKonsumierbar(producer_id));
        }
        // Eigener Flow mit eigener SSRC, Codec wird vom Produzenten uebernommen
        rtp_params.ssrc = self.naechste_nummer();
        let consumer_id = ConsumerId::new();
        self.inner.konsumenten.insert(
            consumer_id,
            KonsumentZustand {
                transport_id,
                producer_id,
                pausiert: true,
            },
        );
        debug!(%consumer_id, %producer_id, %transport_id, "Konsument erstellt (pausiert)");
        Ok(KonsumentBeschreibung {
            consumer_id,
            producer_id,
            kind,
            rtp_params,
        })
    }

    async fn fortsetzen(&self, consumer_id: ConsumerId) -> EngineResult<()> {
        self.pruefen()?;
        let mut konsument = self
            .inner
            .konsumenten
            .get_mut(&consumer_id)
            .ok_or(EngineError::KonsumentNichtGefunden(consumer_id))?;
        konsument.pausiert = false;
        debug!(%consumer_id, "Konsument fortgesetzt");
        Ok(())
    }

    fn ereignisse(&self) -> broadcast::Receiver<EngineEreignis> {
        self.inner.ereignis_tx.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
