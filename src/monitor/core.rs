//! Periodic monitor loop implementation
//!
//! Polls the sensor analyser on a fixed cadence and raises threshold
//! alerts through the dispatcher. One bad tick never terminates the loop.

use std::sync::Arc;

use eyre::Result;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::config::MonitorConfig;
use crate::alert::AlertDispatcher;
use crate::analyser::{SensorAnalyser, SensorReading};

/// The periodic monitor-and-alert loop
pub struct Monitor {
    config: MonitorConfig,
    analyser: Arc<dyn SensorAnalyser>,
    dispatcher: AlertDispatcher,
    tick: u64,
}

impl Monitor {
    pub fn new(config: MonitorConfig, analyser: Arc<dyn SensorAnalyser>, dispatcher: AlertDispatcher) -> Self {
        Self {
            config,
            analyser,
            dispatcher,
            tick: 0,
        }
    }

    /// The current tick count
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Whether a reading breaches the alert threshold
    fn breaches(&self, reading: &SensorReading) -> bool {
        reading.fullness_percent >= self.config.fullness_threshold
    }

    /// Run one tick of the loop body; returns the number of alerts raised
    ///
    /// Alerts are evaluated only on every `alert_frequency`-th tick, so
    /// polling can stay frequent while notifications stay sparse. The
    /// upstream push and graph render run after alerting and their
    /// failures never suppress alerts already raised.
    pub async fn check_once(&mut self) -> Result<usize> {
        self.tick += 1;
        debug!(tick = self.tick, "Monitor tick");

        let readings = self.analyser.refresh().await?;

        let mut alerts = 0;
        if self.tick % self.config.alert_frequency == 0 {
            for reading in readings.iter().filter(|r| self.breaches(r)) {
                let message = format!(
                    "Alert: Bin {} is {:.2}% full. Please empty it.",
                    reading.tag, reading.fullness_percent
                );
                info!(tag = %reading.tag, fullness = reading.fullness_percent, "Threshold breach");

                match self.dispatcher.broadcast(&message).await {
                    Ok(delivered) => {
                        debug!(tag = %reading.tag, delivered, "Alert broadcast");
                        alerts += 1;
                    }
                    Err(e) => error!(tag = %reading.tag, error = %e, "Alert broadcast failed"),
                }
            }
        }

        if let Err(e) = self.analyser.push_upstream().await {
            warn!(error = %e, "Failed to push analysed data upstream");
        }
        if let Err(e) = self.analyser.render_graph().await {
            warn!(error = %e, "Failed to render fullness graph");
        }

        Ok(alerts)
    }

    /// Run the loop until shutdown is signalled
    ///
    /// A failed tick (a bad sensor read) is logged and the loop keeps
    /// polling on the next interval.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval_secs,
            alert_frequency = self.config.alert_frequency,
            "Monitor loop started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.interval()) => {
                    if let Err(e) = self.check_once().await {
                        error!(tick = self.tick, error = %e, "Monitor tick failed");
                    }
                }
                _ = shutdown_rx.changed() => break,
            }
        }

        info!(tick = self.tick, "Monitor loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{RegistryHandle, SessionRegistry};
    use crate::testutil::{MockAnalyser, RecordingTransport};

    fn fixture(
        config: MonitorConfig,
        analyser: Arc<MockAnalyser>,
    ) -> (Monitor, RegistryHandle, Arc<RecordingTransport>) {
        let registry = SessionRegistry::new();
        let handle = registry.handle();
        tokio::spawn(registry.run());

        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = AlertDispatcher::new(handle.clone(), transport.clone());
        let monitor = Monitor::new(config, analyser, dispatcher);
        (monitor, handle, transport)
    }

    fn config(alert_frequency: u64) -> MonitorConfig {
        MonitorConfig {
            interval_secs: 1,
            alert_frequency,
            fullness_threshold: 80.0,
        }
    }

    #[tokio::test]
    async fn test_alert_fires_only_on_frequency_ticks() {
        let analyser = Arc::new(MockAnalyser::with_readings(vec![("Bin-1", 85.0)]));
        let (mut monitor, registry, transport) = fixture(config(3), analyser);
        registry.register_for_broadcast(9).await.unwrap();

        // Ticks 1 and 2: no alert evaluation
        assert_eq!(monitor.check_once().await.unwrap(), 0);
        assert_eq!(monitor.check_once().await.unwrap(), 0);
        assert!(transport.texts_for(9).await.is_empty());

        // Tick 3: exactly one alert referencing the bin and its value
        assert_eq!(monitor.check_once().await.unwrap(), 1);
        let texts = transport.texts_for(9).await;
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("Bin-1"));
        assert!(texts[0].contains("85"));

        // Tick 4 with the same reading: no alert
        assert_eq!(monitor.check_once().await.unwrap(), 0);
        assert_eq!(transport.texts_for(9).await.len(), 1);
    }

    #[tokio::test]
    async fn test_below_threshold_never_alerts() {
        let analyser = Arc::new(MockAnalyser::with_readings(vec![("Bin-1", 79.9)]));
        let (mut monitor, registry, transport) = fixture(config(1), analyser);
        registry.register_for_broadcast(9).await.unwrap();

        for _ in 0..5 {
            assert_eq!(monitor.check_once().await.unwrap(), 0);
        }
        assert!(transport.texts_for(9).await.is_empty());
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive() {
        let analyser = Arc::new(MockAnalyser::with_readings(vec![("Bin-1", 80.0)]));
        let (mut monitor, registry, _) = fixture(config(1), analyser);
        registry.register_for_broadcast(9).await.unwrap();

        assert_eq!(monitor.check_once().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_each_breaching_sensor_alerts_separately() {
        let analyser = Arc::new(MockAnalyser::with_readings(vec![
            ("Bin-1", 92.0),
            ("Bin-2", 40.0),
            ("Bin-3", 81.0),
        ]));
        let (mut monitor, registry, transport) = fixture(config(1), analyser);
        registry.register_for_broadcast(9).await.unwrap();

        assert_eq!(monitor.check_once().await.unwrap(), 2);
        let texts = transport.texts_for(9).await;
        assert_eq!(texts.len(), 2);
        assert!(texts.iter().any(|t| t.contains("Bin-1")));
        assert!(texts.iter().any(|t| t.contains("Bin-3")));
    }

    #[tokio::test]
    async fn test_failed_tick_does_not_advance_alerting_state() {
        let analyser = Arc::new(MockAnalyser::with_readings(vec![("Bin-1", 85.0)]));
        let (mut monitor, registry, _) = fixture(config(2), analyser.clone());
        registry.register_for_broadcast(9).await.unwrap();

        analyser.fail_refresh(true);
        assert!(monitor.check_once().await.is_err());
        // The tick still counted; the loop itself survives (run() logs and continues)
        assert_eq!(monitor.tick(), 1);

        analyser.fail_refresh(false);
        assert_eq!(monitor.check_once().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upstream_push_failure_does_not_suppress_alerts() {
        let analyser = Arc::new(MockAnalyser::with_readings(vec![("Bin-1", 85.0)]));
        analyser.fail_push(true);
        let (mut monitor, registry, transport) = fixture(config(1), analyser.clone());
        registry.register_for_broadcast(9).await.unwrap();

        assert_eq!(monitor.check_once().await.unwrap(), 1);
        assert_eq!(transport.texts_for(9).await.len(), 1);
        // Push and render were still attempted after alerting
        assert_eq!(analyser.pushes(), 1);
        assert_eq!(analyser.renders(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let analyser = Arc::new(MockAnalyser::with_readings(vec![]));
        let (monitor, _, _) = fixture(config(1), analyser);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(monitor.run(shutdown_rx));

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }
}
