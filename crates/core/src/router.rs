use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use tracing::info;

use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    Home,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Home => "/",
        }
    }
}

/// Receives forced navigations from the HTTP client.
pub trait Navigator: Send + Sync {
    fn redirect_to_login(&self);
}

/// Picks the view to show from the requested route and the session gate.
pub struct Router {
    session: Arc<Session>,
    current: Mutex<Route>,
    forced_redirects: AtomicUsize,
}

impl Router {
    pub fn new(session: Arc<Session>) -> Self {
        let initial = gate(Route::Home, session.is_authenticated());
        Self {
            session,
            current: Mutex::new(initial),
            forced_redirects: AtomicUsize::new(0),
        }
    }

    /// Navigate to `requested`, returning the route actually shown.
    pub fn navigate(&self, requested: Route) -> Route {
        let route = gate(requested, self.session.is_authenticated());
        *self.current.lock().expect("router poisoned") = route;
        route
    }

    pub fn current(&self) -> Route {
        *self.current.lock().expect("router poisoned")
    }

    /// Number of redirects forced by authorization failures.
    pub fn forced_redirects(&self) -> usize {
        self.forced_redirects.load(Ordering::SeqCst)
    }
}

impl Navigator for Router {
    fn redirect_to_login(&self) {
        self.forced_redirects.fetch_add(1, Ordering::SeqCst);
        *self.current.lock().expect("router poisoned") = Route::Login;
        info!("redirected to {}", Route::Login.path());
    }
}

fn gate(requested: Route, authenticated: bool) -> Route {
    match (requested, authenticated) {
        (Route::Home, false) => Route::Login,
        (Route::Login | Route::Register, true) => Route::Home,
        (route, _) => route,
    }
}
