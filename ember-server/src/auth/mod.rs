//! Authenticated principal
//!
//! Authentication itself is an external concern: upstream middleware
//! verifies credentials and installs a [`Principal`] on the request. This
//! module defines the principal shape, the axum extractor that reads it
//! from request extensions, and a header-based fallback layer for
//! deployments where the gateway forwards identity as headers.

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

use crate::utils::AppError;

/// Who is making the request
///
/// Staff act on behalf of a restaurant; customers and guests may only
/// operate on their own orders (cancellation).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Principal {
    Staff {
        id: String,
        restaurant_id: String,
    },
    Customer {
        id: String,
    },
    Guest {
        email: String,
        phone: String,
    },
}

impl Principal {
    /// Whether this principal manages the given restaurant
    pub fn is_staff_of(&self, restaurant_id: &str) -> bool {
        matches!(self, Principal::Staff { restaurant_id: rid, .. } if rid == restaurant_id)
    }
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Installed by the auth middleware (or the header fallback below)
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(principal.clone());
        }

        // Gateway header fallback: a JSON principal forwarded by a trusted
        // proxy. The core does not verify it; that is the gateway's job.
        if let Some(raw) = parts
            .headers
            .get("x-principal")
            .and_then(|h| h.to_str().ok())
        {
            let principal: Principal = serde_json::from_str(raw)
                .map_err(|e| AppError::Validation(format!("Malformed principal header: {e}")))?;
            parts.extensions.insert(principal.clone());
            return Ok(principal);
        }

        tracing::warn!(uri = %parts.uri, "Request without principal");
        Err(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_scope_is_per_restaurant() {
        let staff = Principal::Staff {
            id: "emp-1".to_string(),
            restaurant_id: "r-1".to_string(),
        };
        assert!(staff.is_staff_of("r-1"));
        assert!(!staff.is_staff_of("r-2"));

        let guest = Principal::Guest {
            email: "g@example.com".to_string(),
            phone: "+1555".to_string(),
        };
        assert!(!guest.is_staff_of("r-1"));
    }

    #[test]
    fn principal_deserializes_by_role() {
        let p: Principal = serde_json::from_value(serde_json::json!({
            "role": "staff", "id": "emp-1", "restaurant_id": "r-1"
        }))
        .unwrap();
        assert!(matches!(p, Principal::Staff { .. }));
    }
}
