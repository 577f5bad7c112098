use super::claims::{Claims, PermissionSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool { matches!(self, Decision::Allow) }
}

/// Permission gate for an authenticated session.
///
/// No requirement (or an empty one) admits any session. Otherwise the session must hold at
/// least one of the required permissions. Public routes never reach this function.
pub fn authorize(claims: &Claims, required: Option<&PermissionSet>) -> Decision {
    match required {
        None => Decision::Allow,
        Some(req) if req.is_empty() => Decision::Allow,
        Some(req) => {
            if claims.permisos.intersects(req) { Decision::Allow } else { Decision::Deny }
        }
    }
}

/// Nested guards: every level must admit the session.
pub fn authorize_all(claims: &Claims, guards: &[PermissionSet]) -> Decision {
    if guards.iter().all(|g| authorize(claims, Some(g)).is_allowed()) { Decision::Allow } else { Decision::Deny }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::claims::AccountStatus;

    fn with_perms(perms: &[&str]) -> Claims {
        Claims {
            id: 1,
            nombre_usuario: "maria".into(),
            rol: "Digitador".into(),
            email: String::new(),
            estado: AccountStatus::Active,
            horario: None,
            permisos: PermissionSet::from_iter(perms.iter().copied()),
        }
    }

    #[test]
    fn no_requirement_admits_any_session() {
        let c = with_perms(&[]);
        assert_eq!(authorize(&c, None), Decision::Allow);
        assert_eq!(authorize(&c, Some(&PermissionSet::new())), Decision::Allow);
    }

    #[test]
    fn any_match_semantics() {
        let c = with_perms(&["Personas"]);
        assert_eq!(authorize(&c, Some(&PermissionSet::single("Usuarios"))), Decision::Deny);
        assert_eq!(authorize(&c, Some(&PermissionSet::single("Personas"))), Decision::Allow);
        assert_eq!(authorize(&c, Some(&PermissionSet::from_iter(["Usuarios", "Personas"]))), Decision::Allow);
    }

    #[test]
    fn no_implicit_admin() {
        let c = Claims { rol: "Administrador".into(), ..with_perms(&["Usuarios"]) };
        assert_eq!(authorize(&c, Some(&PermissionSet::single("Pagos"))), Decision::Deny);
    }

    #[test]
    fn decision_is_stable_across_calls() {
        let c = with_perms(&["Pagos", "Personas"]);
        let req = PermissionSet::from_iter(["Pagos"]);
        let first = authorize(&c, Some(&req));
        for _ in 0..10 {
            assert_eq!(authorize(&c, Some(&req)), first);
        }
        assert_eq!(c.permisos.len(), 2);
    }

    #[test]
    fn nested_guards_intersect() {
        let c = with_perms(&["Usuarios"]);
        let outer = PermissionSet::single("Usuarios");
        let inner = PermissionSet::single("Roles");
        assert_eq!(authorize_all(&c, &[outer.clone()]), Decision::Allow);
        assert_eq!(authorize_all(&c, &[outer, inner]), Decision::Deny);
        assert_eq!(authorize_all(&c, &[]), Decision::Allow);
    }
}
