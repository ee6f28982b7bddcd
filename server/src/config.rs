//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Medien-Einstellungen
    pub medien: MedienEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
    /// Maximale Anzahl gleichzeitiger Teilnehmer
    pub max_teilnehmer: u32,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Huddle Server".into(),
            max_teilnehmer: 64,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer den Signaling-Kanal
    pub bind_adresse: String,
    /// Port fuer den Signaling-Kanal
    pub signaling_port: u16,
    /// Oeffentlich angekuendigte IP fuer ICE-Kandidaten
    /// (leer = Bind-Adresse verwenden)
    pub angekuendigte_ip: Option<String>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            signaling_port: 3016,
            angekuendigte_ip: None,
        }
    }
}

/// Medien-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MedienEinstellungen {
    /// Unteres Ende des RTC-Port-Bereichs
    pub rtc_port_min: u16,
    /// Oberes Ende des RTC-Port-Bereichs
    pub rtc_port_max: u16,
}

impl Default for MedienEinstellungen {
    fn default() -> Self {
        Self {
            rtc_port_min: 2000,
            rtc_port_max: 2020,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Gibt die vollstaendige Bind-Adresse fuer den Signaling-Kanal zurueck
    pub fn signaling_bind_adresse(&self) -> String {
        format!(
            "{}:{}",
            self.netzwerk.bind_adresse, self.netzwerk.signaling_port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.server.max_teilnehmer, 64);
        assert_eq!(cfg.netzwerk.signaling_port, 3016);
        assert_eq!(cfg.medien.rtc_port_min, 2000);
        assert_eq!(cfg.medien.rtc_port_max, 2020);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn bind_adresse() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.signaling_bind_adresse(), "0.0.0.0:3016");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [server]
            name = "Mein Server"
            max_teilnehmer = 8

            [netzwerk]
            signaling_port = 4000
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.name, "Mein Server");
        assert_eq!(cfg.server.max_teilnehmer, 8);
        assert_eq!(cfg.netzwerk.signaling_port, 4000);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.server.keepalive_sek, 30);
        assert_eq!(cfg.medien.rtc_port_min, 2000);
    }
}
