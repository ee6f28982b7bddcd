//! Fehlertypen fuer den Session-Koordinator

use huddle_core::types::{ConsumerId, ProducerId};
use huddle_media::EngineError;
use huddle_protocol::signal::ErrorCode;
use huddle_protocol::rtp::TransportRichtung;
use thiserror::Error;

/// Fehlertyp fuer den Session-Koordinator
#[derive(Debug, Error)]
pub enum SessionError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Der angeforderte Transport existiert nicht
    #[error("Kein {0}-Transport fuer diesen Teilnehmer")]
    TransportNichtGefunden(TransportRichtung),

    /// Der Transport existiert, ist aber noch nicht verbunden
    #[error("{0}-Transport ist noch nicht verbunden")]
    TransportNichtBereit(TransportRichtung),

    /// Der referenzierte Produzent ist nicht (mehr) live
    #[error("Produzent nicht gefunden: {0}")]
    ProduzentNichtGefunden(ProducerId),

    /// Der referenzierte Konsument existiert nicht (mehr)
    #[error("Konsument nicht gefunden: {0}")]
    KonsumentNichtGefunden(ConsumerId),

    /// Faehigkeiten des Anfragenden decken den Produzenten nicht ab
    #[error("Produzent {0} ist mit den angegebenen Faehigkeiten nicht konsumierbar")]
    NichtKonsumierbar(ProducerId),

    /// Anfrage in diesem Zustand nicht erlaubt oder nicht wohlgeformt
    #[error("Ungueltige Anfrage: {0}")]
    UngueltigeAnfrage(String),

    /// Server hat das Teilnehmer-Limit erreicht
    #[error("Server ist voll")]
    ServerVoll,

    /// Die Media-Engine ist ausgefallen, fatal fuer den Prozess
    #[error("Engine-Ausfall: {0}")]
    EngineAusfall(String),

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SessionError {
    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Der Fehler-Code fuer die Error-Response an den Client
    pub fn fehler_code(&self) -> ErrorCode {
        match self {
            Self::TransportNichtGefunden(_) => ErrorCode::TransportNotFound,
            Self::TransportNichtBereit(_) => ErrorCode::TransportNotReady,
            Self::ProduzentNichtGefunden(_) => ErrorCode::ProducerNotFound,
            Self::KonsumentNichtGefunden(_) => ErrorCode::ConsumerNotFound,
            Self::NichtKonsumierbar(_) => ErrorCode::NotConsumable,
            Self::UngueltigeAnfrage(_) => ErrorCode::InvalidRequest,
            Self::ServerVoll => ErrorCode::ServerFull,
            Self::EngineAusfall(_) => ErrorCode::EngineFailure,
            Self::Io(_) | Self::Intern(_) => ErrorCode::InternalError,
        }
    }

    /// Fatal heisst: der Prozess kann nicht sinnvoll weiterlaufen
    pub fn ist_fatal(&self) -> bool {
        matches!(self, Self::EngineAusfall(_))
    }
}

impl From<EngineError> for SessionError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::ProduzentNichtGefunden(id) => Self::ProduzentNichtGefunden(id),
            EngineError::KonsumentNichtGefunden(id) => Self::KonsumentNichtGefunden(id),
            EngineError::NichtKonsumierbar(id) => Self::NichtKonsumierbar(id),
            EngineError::Ausfall(grund) => Self::EngineAusfall(grund),
            // Transport-/Kontext-Handles verwaltet der Koordinator selbst;
            // verschwinden sie engine-seitig, ist das ein interner Fehler
            EngineError::TransportNichtGefunden(_) | EngineError::KontextNichtGefunden(_) => {
                Self::Intern(e.to_string())
            }
        }
    }
}

/// Result-Typ fuer den Session-Koordinator
pub type SessionResult<T> = Result<T, SessionError>;
