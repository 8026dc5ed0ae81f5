//! Authentication types.

use crate::middleware::authz::Role;
use serde::{Deserialize, Serialize};

/// JWT claims structure, in the wire format issued at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID (opaque).
    #[serde(rename = "userId")]
    pub user_id: String,
    /// User email.
    pub email: String,
    /// User role.
    pub tipo: Role,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
}

impl Claims {
    /// Build claims for a principal with the given issue time and lifetime.
    ///
    /// The expiry saturates at `i64::MAX` instead of wrapping.
    pub fn for_principal(principal: &Principal, issued_at: i64, ttl_secs: i64) -> Self {
        Self {
            user_id: principal.id.clone(),
            email: principal.email.clone(),
            tipo: principal.role,
            iat: issued_at,
            exp: issued_at.saturating_add(ttl_secs),
        }
    }
}

/// Authenticated identity for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// User ID (opaque).
    pub id: String,
    /// User email, lowercased at login.
    pub email: String,
    /// Exactly one role per principal.
    #[serde(rename = "tipo_usuario")]
    pub role: Role,
}

impl Principal {
    /// Create a principal.
    pub fn new(id: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            role,
        }
    }
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.user_id,
            email: claims.email,
            role: claims.tipo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_claims_wire_format() {
        let principal = Principal::new("u-42", "gerente@belz.com.br", Role::Gerente);
        let claims = Claims::for_principal(&principal, 1_700_000_000, 900);

        let value = serde_json::to_value(&claims).unwrap();
        assert_eq!(
            value,
            json!({
                "userId": "u-42",
                "email": "gerente@belz.com.br",
                "tipo": "gerente",
                "iat": 1_700_000_000,
                "exp": 1_700_000_900
            })
        );
    }

    #[test]
    fn test_huge_lifetime_saturates_expiry() {
        let principal = Principal::new("u-1", "gestor@belz.com.br", Role::Gestor);
        let claims = Claims::for_principal(&principal, 1_700_000_000, i64::MAX);

        assert_eq!(claims.exp, i64::MAX);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_unknown_role_claim_rejected() {
        let result: Result<Claims, _> = serde_json::from_value(json!({
            "userId": "u-1",
            "email": "x@belz.com.br",
            "tipo": "admin",
            "iat": 0,
            "exp": 1
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_principal_normalized_from_claims() {
        let claims = Claims {
            user_id: "u-7".into(),
            email: "consultor@belz.com.br".into(),
            tipo: Role::Consultor,
            iat: 0,
            exp: 10,
        };

        let principal = Principal::from(claims);
        assert_eq!(principal.id, "u-7");
        assert_eq!(principal.role, Role::Consultor);

        let value = serde_json::to_value(&principal).unwrap();
        assert_eq!(value["tipo_usuario"], "consultor");
    }
}
