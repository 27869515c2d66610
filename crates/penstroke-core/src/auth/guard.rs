use crate::routes::Route;

use super::session::SessionState;

/// What a guarded route should do for the current session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Session is still initializing; show a neutral waiting state
    Waiting,
    Render,
    Redirect(Route),
}

/// Gate in front of a route.
pub trait RouteGuard: Send + Sync {
    fn check(&self, state: &SessionState) -> Access;
}

/// Only for signed-in users; everyone else goes to sign-in.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtectedRoute;

impl RouteGuard for ProtectedRoute {
    fn check(&self, state: &SessionState) -> Access {
        if state.initializing {
            Access::Waiting
        } else if state.is_authenticated() {
            Access::Render
        } else {
            Access::Redirect(Route::Login)
        }
    }
}

/// Open to everyone. Entry points (sign-in, sign-up) send signed-in users
/// on to their notes instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicRoute {
    pub redirect_if_authenticated: bool,
}

impl RouteGuard for PublicRoute {
    fn check(&self, state: &SessionState) -> Access {
        if state.initializing {
            Access::Waiting
        } else if self.redirect_if_authenticated && state.is_authenticated() {
            Access::Redirect(Route::Notes)
        } else {
            Access::Render
        }
    }
}
