use serde::Serialize;
use termbase_types::Language;
use tokio::sync::mpsc;
use tracing::debug;

/// Signals for the presentation layer. The application only emits them;
/// how they reach a window is up to the [`Notifier`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum AppEvent {
    /// The workspace finished loading and queries will succeed.
    AppLoaded,
    /// Objects changed on disk, through a write or a synchronization.
    UpdatedConcepts { ids: Vec<String> },
    OpenConcept { id: String, lang: Option<Language> },
    OpenDataSynchronizer,
}

impl AppEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AppLoaded => "app-loaded",
            Self::UpdatedConcepts { .. } => "updated-concepts",
            Self::OpenConcept { .. } => "open-concept",
            Self::OpenDataSynchronizer => "open-data-synchronizer",
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, event: AppEvent);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: AppEvent) {}
}

/// Delivers events over an unbounded tokio channel, so a synchronous
/// application core can feed an async front end.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: AppEvent) {
        let name = event.name();
        if self.tx.send(event).is_err() {
            debug!(event = name, "no listener for event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_ui_names() {
        let json = serde_json::to_value(AppEvent::OpenConcept {
            id: "32".into(),
            lang: Some(Language::Fra),
        })
        .unwrap();
        assert_eq!(json["event"], "open-concept");
        assert_eq!(json["lang"], "fra");
        assert_eq!(
            serde_json::to_value(AppEvent::AppLoaded).unwrap()["event"],
            AppEvent::AppLoaded.name()
        );
    }

    #[tokio::test]
    async fn channel_delivers_in_order() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify(AppEvent::AppLoaded);
        notifier.notify(AppEvent::UpdatedConcepts { ids: vec!["1".into()] });
        assert_eq!(rx.recv().await, Some(AppEvent::AppLoaded));
        assert_eq!(
            rx.recv().await,
            Some(AppEvent::UpdatedConcepts { ids: vec!["1".into()] })
        );
    }

    #[test]
    fn closed_channel_is_not_an_error() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        notifier.notify(AppEvent::OpenDataSynchronizer);
    }
}
