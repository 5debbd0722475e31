//! Multi-tenant visibility rules.
//!
//! Every dataset query narrows by the owner ids returned here. The contract
//! is silent filtering: a user without a resolved role or company gets an
//! empty scope, never an error, so row existence is not leaked.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use diesel::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::shared::enums::Role;
use crate::shared::error::{http, ServiceError};
use crate::shared::schema::users;
use crate::shared::state::AppState;

#[derive(Debug, Clone)]
pub struct UserScope {
    /// Tenant of the caller. `None` only in the empty scope.
    pub company_id: Option<Uuid>,
    /// Owner ids whose rows the caller may see. Empty means sees nothing.
    visible: Vec<Uuid>,
    /// Admins also see rows whose owner is unknown (e.g. a lead whose
    /// creator was removed), so those records stay reachable for repair.
    include_unowned: bool,
}

impl UserScope {
    pub fn new(company_id: Option<Uuid>, visible: Vec<Uuid>, include_unowned: bool) -> Self {
        Self {
            company_id,
            visible,
            include_unowned,
        }
    }

    pub fn empty() -> Self {
        Self::new(None, Vec::new(), false)
    }

    pub fn owner_ids(&self) -> &[Uuid] {
        &self.visible
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    pub fn contains(&self, owner: Uuid) -> bool {
        self.visible.contains(&owner)
    }

    pub fn includes_unowned(&self) -> bool {
        self.include_unowned
    }
}

/// Pure narrowing rule, kept separate from the queries so it can be tested
/// without a database.
///
/// - admin: every member of the company
/// - manager: own rows plus direct subordinates'
/// - salesperson: own rows only
/// - no role: nothing
pub fn visible_ids(
    role: Option<Role>,
    user_id: Uuid,
    subordinates: &[Uuid],
    company_members: &[Uuid],
) -> Vec<Uuid> {
    match role {
        Some(Role::Admin) => company_members.to_vec(),
        Some(Role::Manager) => {
            let mut ids = vec![user_id];
            ids.extend(subordinates.iter().copied().filter(|id| *id != user_id));
            ids
        }
        Some(Role::Salesperson) => vec![user_id],
        None => Vec::new(),
    }
}

/// Resolves the caller's scope against the users table.
pub fn resolve(conn: &mut PgConnection, user: &AuthUser) -> Result<UserScope, ServiceError> {
    let (role, company_id) = match (user.role, user.company_id) {
        (Some(role), Some(company_id)) => (role, company_id),
        _ => return Ok(UserScope::empty()),
    };

    let visible = match role {
        Role::Salesperson => vec![user.id],
        Role::Manager => {
            let subordinates: Vec<Uuid> = users::table
                .filter(users::manager_id.eq(user.id))
                .filter(users::company_id.eq(company_id))
                .select(users::id)
                .load(conn)?;
            visible_ids(Some(role), user.id, &subordinates, &[])
        }
        Role::Admin => users::table
            .filter(users::company_id.eq(company_id))
            .select(users::id)
            .load(conn)?,
    };

    Ok(UserScope::new(
        Some(company_id),
        visible,
        role == Role::Admin,
    ))
}

#[derive(Debug, Serialize)]
pub struct VisibleUser {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub role: Option<String>,
}

/// Users the caller may act over, for management screens.
pub fn visible_users(
    conn: &mut PgConnection,
    user: &AuthUser,
) -> Result<Vec<VisibleUser>, ServiceError> {
    let scope = resolve(conn, user)?;
    let rows: Vec<(Uuid, String, String, Option<String>)> = users::table
        .filter(users::id.eq_any(scope.owner_ids()))
        .select((users::id, users::username, users::full_name, users::role))
        .order(users::full_name.asc())
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(id, username, full_name, role)| VisibleUser {
            id,
            username,
            full_name,
            role,
        })
        .collect())
}

pub async fn list_visible_users(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<VisibleUser>>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    visible_users(&mut conn, &user).map(Json).map_err(http)
}

pub fn configure_scope_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/users/visible", get(list_visible_users))
}

#[cfg(test)]
#[path = "scope.test.rs"]
mod tests;
