//! huddle-server – Bibliotheks-Root
//!
//! Deklariert die Server-Module und stellt den oeffentlichen
//! Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;

use huddle_media::{LoopbackEngine, NetzwerkOptionen};
use huddle_session::{disconnect, SessionConfig, SignalingServer, SignalingState};

use config::ServerConfig;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Media-Engine starten
    /// 2. Session-Koordinator verdrahten
    /// 3. Engine-Ereignis-Schleife starten
    /// 4. TCP-Listener fuer den Signaling-Kanal starten
    /// 5. Auf Ctrl-C oder Engine-Ausfall warten
    ///
    /// Ein Engine-Ausfall beendet den Server mit Fehler; ein externer
    /// Supervisor startet den Prozess dann neu.
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            signaling = %self.config.signaling_bind_adresse(),
            rtc_ports = format!(
                "{}-{}",
                self.config.medien.rtc_port_min, self.config.medien.rtc_port_max
            ),
            "Server startet"
        );

        let engine = Arc::new(LoopbackEngine::mit_netzwerk(NetzwerkOptionen {
            angekuendigte_ip: self
                .config
                .netzwerk
                .angekuendigte_ip
                .clone()
                .unwrap_or_else(|| self.config.netzwerk.bind_adresse.clone()),
            rtc_port_min: self.config.medien.rtc_port_min,
            rtc_port_max: self.config.medien.rtc_port_max,
        }));
        let session_config = SessionConfig {
            server_name: self.config.server.name.clone(),
            max_teilnehmer: self.config.server.max_teilnehmer,
            keepalive_sek: self.config.server.keepalive_sek,
            verbindungs_timeout_sek: self.config.server.verbindungs_timeout_sek,
        };
        let state = SignalingState::neu(session_config, engine);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Engine-Ereignis-Schleife: haelt die Indizes konsistent und
        // loest bei Engine-Ausfall den Shutdown aus
        let ereignis_task = tokio::spawn(disconnect::ereignis_schleife(
            Arc::clone(&state),
            shutdown_tx.clone(),
        ));

        let bind_addr = self
            .config
            .signaling_bind_adresse()
            .parse()
            .context("Ungueltige Signaling-Bind-Adresse")?;
        let signaling = SignalingServer::neu(Arc::clone(&state), bind_addr);
        let signaling_task = tokio::spawn(signaling.starten(shutdown_rx.clone()));

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");

        let mut shutdown_beobachter = shutdown_rx.clone();
        let engine_ausfall = tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Ctrl-C-Handler fehlgeschlagen")?;
                tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
                false
            }
            _ = shutdown_beobachter.changed() => {
                // Der einzige interne Ausloeser ist der Engine-Ausfall
                tracing::error!("Interner Shutdown (Engine-Ausfall)");
                true
            }
        };

        let _ = shutdown_tx.send(true);
        let _ = signaling_task.await;
        ereignis_task.abort();

        if engine_ausfall {
            anyhow::bail!("Engine-Ausfall, Neustart erforderlich");
        }
        Ok(())
    }
}
