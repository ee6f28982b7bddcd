//! huddle-media – Media-Engine-Adapter
//!
//! Duenner Durchgriff auf die Transport-/Produzenten-/Konsumenten-
//! Primitiven der externen Media-Engine. Codec-, ICE- und DTLS-
//! Negotiation sind Sache der Engine; dieser Crate kennt nur die
//! Handles die er zurueckbekommt.
//!
//! Neben der `MediaEngine`-Schnittstelle liefert der Crate eine
//! `LoopbackEngine`: eine prozess-interne Implementierung mit denselben
//! Semantiken (pausierte Konsumenten, kaskadierende Schliessungen,
//! Ereignis-Strom), die vom Server-Binary und den Tests verwendet wird.

pub mod engine;
pub mod error;
pub mod loopback;

pub use engine::{
    EngineEreignis, KonsumentBeschreibung, KontextId, MediaEngine, RoutingKontext,
    TransportBeschreibung,
};
pub use error::{EngineError, EngineResult};
pub use loopback::{LoopbackEngine, NetzwerkOptionen};
