//! huddle-protocol – Netzwerkprotokoll-Definitionen
//!
//! Dieses Crate definiert alle Nachrichtentypen, Enums und Strukturen
//! die zwischen Client und Server ausgetauscht werden, sowie die
//! Medien-Parameter-Typen die mit der Media-Engine geteilt werden.

pub mod rtp;
pub mod signal;
pub mod wire;

pub use rtp::{MediaKind, RtpCapabilities, TransportRichtung};
pub use signal::{ErrorCode, SignalMessage, SignalPayload};
pub use wire::FrameCodec;
