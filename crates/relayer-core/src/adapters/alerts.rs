//! Operator alerts: a console channel and a named channel registry.

use crate::domain::{Alert, AlertSeverity, RelayerError, RelayerResult};
use crate::ports::outbound::{AlertChannel, AlertSink};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Writes alerts to the process log.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleAlertChannel;

impl AlertChannel for ConsoleAlertChannel {
    fn send(&self, alert: &Alert) -> RelayerResult<()> {
        match alert.severity {
            AlertSeverity::Warning => warn!("[alert] {}", alert.message),
            AlertSeverity::Critical => error!("[alert] {}", alert.message),
        }
        Ok(())
    }
}

/// Registry of named alert channels.
///
/// Alerts go to one channel by name or to every channel in registration
/// order. A failing channel is logged and skipped; the others still get
/// the alert.
#[derive(Default)]
pub struct AlertRouter {
    channels: RwLock<Vec<(String, Arc<dyn AlertChannel>)>>,
}

impl AlertRouter {
    /// Name the console channel registers under.
    pub const CONSOLE: &'static str = "console";

    /// Router with no channels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Router with only the console channel.
    pub fn with_console() -> Self {
        let router = Self::new();
        router
            .channels
            .write()
            .push((Self::CONSOLE.to_string(), Arc::new(ConsoleAlertChannel)));
        router
    }

    /// Register `channel` under `name`.
    ///
    /// # Errors
    ///
    /// `Config` if `name` is already taken.
    pub fn register(
        &self,
        name: impl Into<String>,
        channel: Arc<dyn AlertChannel>,
    ) -> RelayerResult<()> {
        let name = name.into();
        let mut channels = self.channels.write();
        if channels.iter().any(|(existing, _)| *existing == name) {
            return Err(RelayerError::Config(format!(
                "alert channel '{}' is already registered",
                name
            )));
        }
        info!("[alert] registered channel '{}'", name);
        channels.push((name, channel));
        Ok(())
    }

    /// Registered channel names, in registration order.
    pub fn channel_names(&self) -> Vec<String> {
        self.channels
            .read()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Send `alert` to `target`, or to every channel when `target` is
    /// `None`. Returns how many channels accepted it.
    pub fn dispatch(&self, alert: &Alert, target: Option<&str>) -> usize {
        let channels = self.channels.read();

        if let Some(target) = target {
            let Some((name, channel)) = channels.iter().find(|(name, _)| name == target) else {
                warn!("[alert] no channel named '{}', alert dropped", target);
                return 0;
            };
            debug!("[alert] sending to '{}'", name);
            return usize::from(Self::deliver(name, channel.as_ref(), alert));
        }

        if channels.is_empty() {
            warn!("[alert] no channels registered, alert dropped: {}", alert);
            return 0;
        }
        channels
            .iter()
            .filter(|(name, channel)| Self::deliver(name, channel.as_ref(), alert))
            .count()
    }

    fn deliver(name: &str, channel: &dyn AlertChannel, alert: &Alert) -> bool {
        match channel.send(alert) {
            Ok(()) => true,
            Err(e) => {
                error!("[alert] channel '{}' failed: {}", name, e);
                false
            }
        }
    }
}

impl AlertSink for AlertRouter {
    fn raise(&self, alert: &Alert) {
        self.dispatch(alert, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryAlertChannel;

    struct BrokenChannel;

    impl AlertChannel for BrokenChannel {
        fn send(&self, _alert: &Alert) -> RelayerResult<()> {
            Err(RelayerError::AlertChannel {
                channel: "broken".to_string(),
                reason: "webhook unreachable".to_string(),
            })
        }
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let router = AlertRouter::with_console();
        let err = router
            .register(AlertRouter::CONSOLE, Arc::new(ConsoleAlertChannel))
            .unwrap_err();
        assert!(matches!(err, RelayerError::Config(_)));
        assert_eq!(router.channel_names(), vec!["console".to_string()]);
    }

    #[test]
    fn test_broadcast_reaches_every_channel() {
        let router = AlertRouter::new();
        let first = Arc::new(InMemoryAlertChannel::new());
        let second = Arc::new(InMemoryAlertChannel::new());
        router.register("first", first.clone()).unwrap();
        router.register("second", second.clone()).unwrap();

        let delivered = router.dispatch(&Alert::warning("dead-lettered 1:0xab:0"), None);
        assert_eq!(delivered, 2);
        assert_eq!(first.alerts().len(), 1);
        assert_eq!(second.alerts().len(), 1);
    }

    #[test]
    fn test_targeted_dispatch() {
        let router = AlertRouter::new();
        let pager = Arc::new(InMemoryAlertChannel::new());
        let chat = Arc::new(InMemoryAlertChannel::new());
        router.register("pager", pager.clone()).unwrap();
        router.register("chat", chat.clone()).unwrap();

        assert_eq!(router.dispatch(&Alert::critical("faulted"), Some("pager")), 1);
        assert_eq!(pager.alerts().len(), 1);
        assert!(chat.alerts().is_empty());

        assert_eq!(router.dispatch(&Alert::critical("faulted"), Some("sms")), 0);
    }

    #[test]
    fn test_failing_channel_does_not_block_others() {
        let router = AlertRouter::new();
        let memory = Arc::new(InMemoryAlertChannel::new());
        router.register("broken", Arc::new(BrokenChannel)).unwrap();
        router.register("memory", memory.clone()).unwrap();

        router.raise(&Alert::critical("faulted at cursor 900"));
        assert_eq!(memory.alerts(), vec![Alert::critical("faulted at cursor 900")]);
    }

    #[test]
    fn test_empty_router_drops_alert() {
        assert_eq!(AlertRouter::new().dispatch(&Alert::warning("x"), None), 0);
    }
}
