//! Views the client can show and the seam used to move between them.

use std::sync::Mutex;

use shared::domain::ArtifactId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Login,
    Dashboard,
    ArtifactDetail(ArtifactId),
    Upload,
}

impl View {
    pub fn requires_session(&self) -> bool {
        !matches!(self, View::Login)
    }
}

pub trait Navigator: Send + Sync {
    fn current(&self) -> View;
    fn navigate(&self, view: View);
}

/// Navigator for headless use; always reports the login view.
pub struct NullNavigator;

impl Navigator for NullNavigator {
    fn current(&self) -> View {
        View::Login
    }

    fn navigate(&self, _view: View) {}
}

/// Keeps the current view in memory and records every navigation.
pub struct MemoryNavigator {
    inner: Mutex<MemoryNavigatorState>,
}

struct MemoryNavigatorState {
    current: View,
    history: Vec<View>,
}

impl MemoryNavigator {
    pub fn new(initial: View) -> Self {
        Self {
            inner: Mutex::new(MemoryNavigatorState {
                current: initial,
                history: Vec::new(),
            }),
        }
    }

    pub fn history(&self) -> Vec<View> {
        self.lock().history.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryNavigatorState> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Navigator for MemoryNavigator {
    fn current(&self) -> View {
        self.lock().current.clone()
    }

    fn navigate(&self, view: View) {
        let mut guard = self.lock();
        guard.history.push(view.clone());
        guard.current = view;
    }
}
