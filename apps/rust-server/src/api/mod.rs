// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, put, MethodRouter},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{middleware::authenticate, TokenPair},
    error::ErrorBody,
    rbac::{enforce, Permission, PermissionRegistry, Role, RoleUpdate},
    state::AppState,
};

pub mod auth;
pub mod health;
pub mod permissions;
pub mod roles;
pub mod sessions;
pub mod users;

/// Routes that require an authenticated session, each behind its own
/// permission gate. Every key is recorded for the startup catalog sync.
struct GuardedRoutes {
    state: AppState,
    router: Router<AppState>,
    registry: PermissionRegistry,
}

impl GuardedRoutes {
    fn new(state: &AppState) -> Self {
        Self {
            state: state.clone(),
            router: Router::new(),
            registry: PermissionRegistry::new(),
        }
    }

    /// Mount `method_router` at `path`, gated by `permission`. An empty
    /// permission only requires authentication.
    fn route(mut self, path: &str, method_router: MethodRouter<AppState>, permission: &str) -> Self {
        self.registry.register(permission);
        let gate = self.state.enforcer.require(permission);
        self.router = self
            .router
            .route(path, method_router.route_layer(from_fn_with_state(gate, enforce)));
        self
    }

    /// Apply authentication to every guarded route.
    fn finish(self) -> (Router<AppState>, PermissionRegistry) {
        let router = self
            .router
            .route_layer(from_fn_with_state(self.state, authenticate));
        (router, self.registry)
    }
}

/// Build the application router and the registry of every permission its
/// routes declare.
pub fn router(state: AppState) -> (Router, PermissionRegistry) {
    let (protected, registry) = GuardedRoutes::new(&state)
        .route("/auth/logout", post(auth::logout), "")
        .route("/v1/users/me", get(users::get_current_user), "")
        .route("/v1/users", get(users::list_users), "user:list")
        .route("/v1/users", post(users::create_user), "user:create")
        .route(
            "/v1/users/{user_id}/roles",
            put(users::assign_user_roles),
            "user:assign_roles",
        )
        .route("/v1/roles", get(roles::list_roles), "role:list")
        .route("/v1/roles", post(roles::create_role), "role:create")
        .route("/v1/roles/{role_id}", get(roles::get_role), "role:view")
        .route("/v1/roles/{role_id}", put(roles::update_role), "role:update")
        .route("/v1/roles/{role_id}", delete(roles::delete_role), "role:delete")
        .route(
            "/v1/roles/{role_id}/permissions",
            get(roles::get_role_permissions),
            "role:view",
        )
        .route(
            "/v1/roles/{role_id}/permissions",
            put(roles::assign_role_permissions),
            "role:assign_permissions",
        )
        .route(
            "/v1/permissions",
            get(permissions::list_permissions),
            "permission:list",
        )
        .route(
            "/v1/permissions",
            post(permissions::create_permission),
            "permission:create",
        )
        .route(
            "/v1/permissions/{permission_id}",
            get(permissions::get_permission),
            "permission:view",
        )
        .route(
            "/v1/permissions/{permission_id}",
            delete(permissions::delete_permission),
            "permission:delete",
        )
        .route(
            "/v1/sessions/{session_id}",
            delete(sessions::revoke_session),
            "session:revoke",
        )
        .finish();

    let public = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    let app = Router::new()
        .merge(public)
        .merge(protected)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        );

    (app, registry)
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login,
        auth::refresh,
        auth::logout,
        users::get_current_user,
        users::list_users,
        users::create_user,
        users::assign_user_roles,
        roles::list_roles,
        roles::create_role,
        roles::get_role,
        roles::update_role,
        roles::delete_role,
        roles::get_role_permissions,
        roles::assign_role_permissions,
        permissions::list_permissions,
        permissions::create_permission,
        permissions::get_permission,
        permissions::delete_permission,
        sessions::revoke_session,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            TokenPair,
            ErrorBody,
            Role,
            RoleUpdate,
            Permission,
            auth::LoginRequest,
            auth::RefreshRequest,
            users::UserMeResponse,
            users::UserResponse,
            users::CreateUserRequest,
            users::AssignRolesRequest,
            roles::CreateRoleRequest,
            roles::AssignPermissionsRequest,
            permissions::CreatePermissionRequest,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token refresh and logout"),
        (name = "Users", description = "User accounts and role membership"),
        (name = "Roles", description = "Roles and their permissions"),
        (name = "Permissions", description = "Permission catalog"),
        (name = "Sessions", description = "Administrative session revocation"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
