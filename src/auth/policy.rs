//! Route access decisions.
//!
//! Flow Overview: every protected route declares a [`RouteClass`]; the
//! resolved identity (or its absence) and that class select exactly one
//! [`Outcome`]. Authenticated callers lacking the required role always get
//! `403`, never `404`. Anonymous callers get `401` on API routes and a
//! redirect to the login page on dashboard pages.

use super::models::{Identity, Role};

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RouteClass {
    /// No protection.
    Public,
    /// API routes open to any resolved identity.
    Session,
    /// Dashboard pages; the bootstrap account is kept out.
    Dashboard,
    /// Dashboard pages reserved for superadmins.
    DashboardAdmin,
    /// API routes reserved for superadmins.
    Superadmin,
    /// The setup page, only for the bootstrap account.
    SetupPage,
    /// The setup API, only for the bootstrap account.
    SetupApi,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Allow,
    Redirect {
        location: &'static str,
        clear_session: bool,
    },
    Unauthorized,
    Forbidden,
}

impl Outcome {
    const fn to_login() -> Self {
        Self::Redirect {
            location: LOGIN_PATH,
            clear_session: false,
        }
    }

    const fn home_clearing_session() -> Self {
        Self::Redirect {
            location: HOME_PATH,
            clear_session: true,
        }
    }
}

/// Decide whether `identity` may reach a route of class `route`.
#[must_use]
pub fn decide(identity: Option<&Identity>, route: RouteClass) -> Outcome {
    let role = identity.map(|identity| identity.role);

    match (route, role) {
        (RouteClass::Public, _)
        | (RouteClass::Session, Some(_))
        | (RouteClass::Dashboard, Some(Role::User | Role::Superadmin))
        | (RouteClass::DashboardAdmin | RouteClass::Superadmin, Some(Role::Superadmin))
        | (RouteClass::SetupPage | RouteClass::SetupApi, Some(Role::Temp)) => Outcome::Allow,

        (RouteClass::Session | RouteClass::Superadmin | RouteClass::SetupApi, None) => {
            Outcome::Unauthorized
        }
        (RouteClass::Dashboard | RouteClass::DashboardAdmin, None) => Outcome::to_login(),
        (RouteClass::SetupPage, _) => Outcome::home_clearing_session(),

        (RouteClass::Dashboard, Some(Role::Temp))
        | (RouteClass::DashboardAdmin | RouteClass::Superadmin, Some(Role::User | Role::Temp))
        | (RouteClass::SetupApi, Some(Role::User | Role::Superadmin)) => Outcome::Forbidden,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn who(role: Role) -> Identity {
        Identity {
            username: "someone".to_string(),
            role,
        }
    }

    fn outcomes(route: RouteClass) -> [Outcome; 4] {
        [
            decide(None, route),
            decide(Some(&who(Role::Temp)), route),
            decide(Some(&who(Role::User)), route),
            decide(Some(&who(Role::Superadmin)), route),
        ]
    }

    #[test]
    fn public_routes_allow_everyone() {
        assert!(outcomes(RouteClass::Public)
            .iter()
            .all(|outcome| *outcome == Outcome::Allow));
    }

    #[test]
    fn session_routes_need_any_identity() {
        assert_eq!(
            outcomes(RouteClass::Session),
            [
                Outcome::Unauthorized,
                Outcome::Allow,
                Outcome::Allow,
                Outcome::Allow
            ]
        );
    }

    #[test]
    fn dashboard_redirects_anonymous_and_blocks_temp() {
        assert_eq!(
            outcomes(RouteClass::Dashboard),
            [
                Outcome::Redirect {
                    location: "/login",
                    clear_session: false
                },
                Outcome::Forbidden,
                Outcome::Allow,
                Outcome::Allow
            ]
        );
    }

    #[test]
    fn dashboard_admin_pages_are_superadmin_only() {
        assert_eq!(
            outcomes(RouteClass::DashboardAdmin),
            [
                Outcome::Redirect {
                    location: "/login",
                    clear_session: false
                },
                Outcome::Forbidden,
                Outcome::Forbidden,
                Outcome::Allow
            ]
        );
    }

    #[test]
    fn superadmin_api_uses_401_then_403() {
        assert_eq!(
            outcomes(RouteClass::Superadmin),
            [
                Outcome::Unauthorized,
                Outcome::Forbidden,
                Outcome::Forbidden,
                Outcome::Allow
            ]
        );
    }

    #[test]
    fn setup_page_clears_session_for_everyone_but_temp() {
        let home = Outcome::Redirect {
            location: "/",
            clear_session: true,
        };
        assert_eq!(
            outcomes(RouteClass::SetupPage),
            [home.clone(), Outcome::Allow, home.clone(), home]
        );
    }

    #[test]
    fn setup_api_is_temp_only() {
        assert_eq!(
            outcomes(RouteClass::SetupApi),
            [
                Outcome::Unauthorized,
                Outcome::Allow,
                Outcome::Forbidden,
                Outcome::Forbidden
            ]
        );
    }
}
