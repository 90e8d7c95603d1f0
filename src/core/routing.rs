//! Role-gated navigation targets.
use crate::core::session::{Role, Session, SessionState};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Root,
    Login,
    AdminHome,
    AgentHome,
    MarketPrices,
    PriceComparison,
    TrendPrediction,
    MarketAnalysis,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Root => "/",
            Route::Login => "/login",
            Route::AdminHome => "/admin",
            Route::AgentHome => "/agent",
            Route::MarketPrices => "/market-prices",
            Route::PriceComparison => "/price-comparison",
            Route::TrendPrediction => "/trend-prediction",
            Route::MarketAnalysis => "/market-analysis",
        }
    }

    /// Roles allowed on this route; empty means any authenticated user.
    pub fn required_roles(self) -> &'static [Role] {
        match self {
            Route::AdminHome => &[Role::Admin],
            Route::AgentHome => &[Role::Agent],
            _ => &[],
        }
    }

    pub fn is_protected(self) -> bool {
        self != Route::Login
    }

    pub fn home_for(role: Role) -> Route {
        match role {
            Role::Admin => Route::AdminHome,
            Role::Agent => Route::AgentHome,
        }
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Render(Route),
    Redirect(Route),
}

/// Decides what a visit to `route` resolves to for the given session.
pub fn resolve(route: Route, session: &Session) -> Navigation {
    let user = match session.state() {
        SessionState::Authenticated(user) => user,
        SessionState::Anonymous | SessionState::Authenticating { .. } => {
            return if route.is_protected() {
                Navigation::Redirect(Route::Login)
            } else {
                Navigation::Render(route)
            };
        }
    };

    let home = Route::home_for(user.role);
    match route {
        Route::Root | Route::Login => Navigation::Redirect(home),
        r if !r.required_roles().is_empty() && !r.required_roles().contains(&user.role) => {
            Navigation::Redirect(home)
        }
        r => Navigation::Render(r),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::tests::user;

    fn session_with(role: Role) -> Session {
        let mut session = Session::anonymous();
        session.login_succeeded(user(role));
        session
    }

    #[test]
    fn test_root_redirects_by_role() {
        assert_eq!(
            resolve(Route::Root, &session_with(Role::Admin)),
            Navigation::Redirect(Route::AdminHome)
        );
        assert_eq!(
            resolve(Route::Root, &session_with(Role::Agent)),
            Navigation::Redirect(Route::AgentHome)
        );
        assert_eq!(
            resolve(Route::Root, &Session::anonymous()),
            Navigation::Redirect(Route::Login)
        );
    }

    #[test]
    fn test_protected_routes_require_login() {
        let mut session = Session::anonymous();
        assert_eq!(
            resolve(Route::MarketPrices, &session),
            Navigation::Redirect(Route::Login)
        );
        assert_eq!(
            resolve(Route::Login, &session),
            Navigation::Render(Route::Login)
        );

        session.begin_login("agent");
        assert_eq!(
            resolve(Route::AgentHome, &session),
            Navigation::Redirect(Route::Login)
        );
    }

    #[test]
    fn test_wrong_role_goes_home() {
        assert_eq!(
            resolve(Route::AdminHome, &session_with(Role::Agent)),
            Navigation::Redirect(Route::AgentHome)
        );
        assert_eq!(
            resolve(Route::AgentHome, &session_with(Role::Admin)),
            Navigation::Redirect(Route::AdminHome)
        );
        assert_eq!(
            resolve(Route::AdminHome, &session_with(Role::Admin)),
            Navigation::Render(Route::AdminHome)
        );
        assert_eq!(
            resolve(Route::TrendPrediction, &session_with(Role::Agent)),
            Navigation::Render(Route::TrendPrediction)
        );
    }

    #[test]
    fn test_login_page_when_authenticated() {
        assert_eq!(
            resolve(Route::Login, &session_with(Role::Agent)),
            Navigation::Redirect(Route::AgentHome)
        );
    }
}
