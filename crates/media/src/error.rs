//! Fehlertypen fuer den Media-Engine-Adapter

use huddle_core::types::{ConsumerId, ProducerId, TransportId};
use thiserror::Error;

use crate::engine::KontextId;

/// Fehlertyp fuer Engine-Aufrufe
#[derive(Debug, Error)]
pub enum EngineError {
    /// Routing-Kontext existiert nicht (mehr)
    #[error("Routing-Kontext nicht gefunden: {0}")]
    KontextNichtGefunden(KontextId),

    /// Transport existiert nicht (mehr)
    #[error("Transport nicht gefunden: {0}")]
    TransportNichtGefunden(TransportId),

    /// Produzent existiert nicht (mehr)
    #[error("Produzent nicht gefunden: {0}")]
    ProduzentNichtGefunden(ProducerId),

    /// Konsument existiert nicht (mehr)
    #[error("Konsument nicht gefunden: {0}")]
    KonsumentNichtGefunden(ConsumerId),

    /// Faehigkeiten des Empfaengers passen nicht zum Produzenten
    #[error("Produzent {0} ist mit den angegebenen Faehigkeiten nicht konsumierbar")]
    NichtKonsumierbar(ProducerId),

    /// Die Engine ist unbrauchbar geworden, fataler Zustand:
    /// der Prozess muss neu starten
    #[error("Engine-Ausfall: {0}")]
    Ausfall(String),
}

/// Result-Typ fuer Engine-Aufrufe
pub type EngineResult<T> = Result<T, EngineError>;
