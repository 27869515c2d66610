//! Client routes and the guard that fronts each one.

use crate::auth::guard::{ProtectedRoute, PublicRoute, RouteGuard};

static PROTECTED: ProtectedRoute = ProtectedRoute;
static PUBLIC: PublicRoute = PublicRoute {
    redirect_if_authenticated: false,
};
static PUBLIC_ENTRY: PublicRoute = PublicRoute {
    redirect_if_authenticated: true,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Landing,
    Login,
    Signup,
    OtpVerification,
    Notes,
    NotFound,
}

impl Route {
    pub const ALL: [Route; 6] = [
        Route::Landing,
        Route::Login,
        Route::Signup,
        Route::OtpVerification,
        Route::Notes,
        Route::NotFound,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Landing => "/",
            Route::Login => "/login",
            Route::Signup => "/signup",
            Route::OtpVerification => "/otp-verification",
            Route::Notes => "/notes",
            Route::NotFound => "*",
        }
    }

    /// Resolve a location path; unknown paths map to `NotFound`
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let trimmed = if path.len() > 1 {
            path.trim_end_matches('/')
        } else {
            path
        };
        Route::ALL
            .into_iter()
            .find(|r| *r != Route::NotFound && r.path() == trimmed)
            .unwrap_or(Route::NotFound)
    }

    /// Guard fronting this route. `NotFound` has none.
    pub fn guard(&self) -> Option<&'static dyn RouteGuard> {
        match self {
            Route::Landing | Route::OtpVerification => Some(&PUBLIC),
            Route::Login | Route::Signup => Some(&PUBLIC_ENTRY),
            Route::Notes => Some(&PROTECTED),
            Route::NotFound => None,
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}
