//! Which view the presentation surface should show

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use super::TimerId;
use crate::services::Navigator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", content = "timerId", rename_all = "lowercase")]
pub enum View {
    /// Timer list; an active session shows minimized
    Home,
    /// Full view of one timer
    Timer(TimerId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub view: View,
    /// Bumped whenever the application is asked to come to the foreground
    pub focus_requests: u64,
}

/// Navigator publishing the current view on a watch channel
#[derive(Debug)]
pub struct ViewRouter {
    tx: watch::Sender<ViewState>,
}

impl ViewRouter {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ViewState {
            view: View::Home,
            focus_requests: 0,
        });
        Self { tx }
    }

    pub fn current(&self) -> ViewState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.tx.subscribe()
    }

    fn set_view(&self, view: View) {
        debug!("Navigating to {:?}", view);
        self.tx.send_modify(|state| state.view = view);
    }
}

impl Default for ViewRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for ViewRouter {
    fn focus(&self) {
        self.tx.send_modify(|state| state.focus_requests += 1);
    }

    fn open_timer(&self, timer_id: &TimerId) {
        self.set_view(View::Timer(timer_id.clone()));
    }

    fn go_home(&self) {
        self.set_view(View::Home);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_tracks_view_and_focus() {
        let router = ViewRouter::new();
        let rx = router.subscribe();
        router.focus();
        router.open_timer(&TimerId::new("a"));
        assert_eq!(rx.borrow().view, View::Timer(TimerId::new("a")));
        assert_eq!(rx.borrow().focus_requests, 1);
        router.go_home();
        assert_eq!(router.current().view, View::Home);
    }

    #[test]
    fn view_serializes_with_timer_id() {
        let json = serde_json::to_value(View::Timer(TimerId::new("a"))).unwrap();
        assert_eq!(json["view"], "timer");
        assert_eq!(json["timerId"], "a");
    }
}
