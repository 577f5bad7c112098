//! Route table for client navigation.
//!
//! Guards compose top-down: a nested route must satisfy every permission requirement on the
//! path from the root to itself, and needs a session if any ancestor does.

use crate::datasvc::Entity;
use crate::identity::{authorize_all, Claims, PermissionSet};

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/home";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    /// Authenticated and holding at least one of these permissions.
    Permission(PermissionSet),
}

#[derive(Debug, Clone)]
pub struct Route {
    pub path: String,
    pub component: String,
    pub access: Access,
    pub children: Vec<Route>,
}

impl Route {
    pub fn new(path: &str, component: &str, access: Access) -> Self {
        Self { path: path.to_string(), component: component.to_string(), access, children: Vec::new() }
    }

    pub fn public(path: &str, component: &str) -> Self { Self::new(path, component, Access::Public) }

    pub fn authenticated(path: &str, component: &str) -> Self { Self::new(path, component, Access::Authenticated) }

    pub fn permission(path: &str, component: &str, permission: &str) -> Self {
        Self::new(path, component, Access::Permission(PermissionSet::single(permission)))
    }

    pub fn child(mut self, route: Route) -> Self {
        self.children.push(route);
        self
    }

    fn matches(&self, path: &str) -> bool {
        let want: Vec<&str> = self.path.split('/').filter(|s| !s.is_empty()).collect();
        let got: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        want.len() == got.len() && want.iter().zip(&got).all(|(w, g)| w.starts_with(':') || w == g)
    }
}

/// A matched route with the guards of all its ancestors folded in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub component: String,
    pub requires_auth: bool,
    pub guards: Vec<PermissionSet>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Render(String),
    RedirectLogin,
    RedirectHome,
    NotFound,
}

impl Navigation {
    /// Where the browser ends up: the redirect target, or `None` to stay.
    pub fn redirect_target(&self) -> Option<&'static str> {
        match self {
            Navigation::RedirectLogin => Some(LOGIN_PATH),
            Navigation::RedirectHome => Some(HOME_PATH),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    roots: Vec<Route>,
}

impl RouteTable {
    pub fn new(roots: Vec<Route>) -> Self { Self { roots } }

    pub fn resolve(&self, path: &str) -> Option<ResolvedRoute> {
        let path = path.split(['?', '#']).next().unwrap_or("");
        fn walk(routes: &[Route], path: &str, auth: bool, guards: &mut Vec<PermissionSet>) -> Option<ResolvedRoute> {
            for r in routes {
                let (needs_auth, pushed) = match &r.access {
                    Access::Public => (auth, false),
                    Access::Authenticated => (true, false),
                    Access::Permission(p) => {
                        guards.push(p.clone());
                        (true, true)
                    }
                };
                if r.matches(path) {
                    return Some(ResolvedRoute { component: r.component.clone(), requires_auth: needs_auth, guards: guards.clone() });
                }
                if let Some(found) = walk(&r.children, path, needs_auth, guards) {
                    return Some(found);
                }
                if pushed {
                    guards.pop();
                }
            }
            None
        }
        walk(&self.roots, path, false, &mut Vec::new())
    }

    /// Decide a navigation: unknown path, then missing session, then permission.
    pub fn navigate(&self, path: &str, session: Option<&Claims>) -> Navigation {
        let Some(route) = self.resolve(path) else { return Navigation::NotFound };
        if !route.requires_auth {
            return Navigation::Render(route.component);
        }
        let Some(claims) = session else { return Navigation::RedirectLogin };
        if authorize_all(claims, &route.guards).is_allowed() {
            Navigation::Render(route.component)
        } else {
            Navigation::RedirectHome
        }
    }

    /// The application's routes. Entity pages are guarded by the same permission strings
    /// the API checks.
    pub fn default_app() -> Self {
        let mut roots = vec![
            Route::public("/", "Landing"),
            Route::public(LOGIN_PATH, "Login"),
            Route::authenticated(HOME_PATH, "Home"),
            Route::authenticated("/perfil/password", "CambiarContrasena"),
        ];
        for entity in Entity::DISPATCHABLE {
            let name = entity.as_str();
            let component = capitalize(name);
            roots.push(
                Route::permission(&format!("/{}", name), &component, entity.permission())
                    .child(Route::authenticated(&format!("/{}/:id", name), &format!("{}Detalle", component))),
            );
        }
        roots.push(
            Route::permission("/admin", "Administracion", Entity::Usuarios.permission())
                .child(Route::permission("/admin/usuarios", "Usuarios", Entity::Usuarios.permission()))
                .child(Route::permission("/admin/roles", "Roles", Entity::Roles.permission())),
        );
        Self::new(roots)
    }
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        Some(f) => f.to_uppercase().chain(c).collect(),
        None => String::new(),
    }
}
