pub mod directory;
pub mod models;
pub mod routes;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use serde_json::json;
use shelf_kernel::{settings::Environment, InitCtx, Migration, Module};

use crate::state::AppState;

/// Account registration, login and the current-user lookup, mounted as `auth`.
pub struct UsersModule {
    state: AppState,
}

impl UsersModule {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for UsersModule {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        if ctx.settings.environment != Environment::Production
            && ctx.settings.auth.jwt_secret == shelf_kernel::settings::DEVELOPMENT_JWT_SECRET
        {
            tracing::warn!(module = self.name(), "signing tokens with the development secret");
        }
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = |description: &str| {
            json!({
                "description": description,
                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } }
            })
        };
        let session = json!({
            "application/json": { "schema": { "$ref": "#/components/schemas/AuthSession" } }
        });

        Some(json!({
            "paths": {
                "/register": {
                    "post": {
                        "summary": "Register an account",
                        "tags": ["Auth"],
                        "requestBody": {
                            "required": true,
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/RegisterUser" } } }
                        },
                        "responses": {
                            "201": { "description": "Registered", "content": session.clone() },
                            "400": error("Validation error"),
                            "409": error("Email already registered")
                        }
                    }
                },
                "/login": {
                    "post": {
                        "summary": "Log in",
                        "tags": ["Auth"],
                        "requestBody": {
                            "required": true,
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/LoginUser" } } }
                        },
                        "responses": {
                            "200": { "description": "Logged in", "content": session },
                            "400": error("Validation error"),
                            "401": error("Invalid credentials")
                        }
                    }
                },
                "/me": {
                    "get": {
                        "summary": "Current user",
                        "tags": ["Auth"],
                        "security": [{ "bearerAuth": [] }],
                        "responses": {
                            "200": {
                                "description": "Current user",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "object",
                                            "properties": { "user": { "$ref": "#/components/schemas/User" } }
                                        }
                                    }
                                }
                            },
                            "401": error("Not authenticated")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "User": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string", "format": "uuid" },
                            "name": { "type": "string" },
                            "email": { "type": "string", "format": "email" },
                            "createdAt": { "type": "string", "format": "date-time" }
                        },
                        "required": ["id", "name", "email", "createdAt"]
                    },
                    "AuthSession": {
                        "type": "object",
                        "properties": {
                            "user": { "$ref": "#/components/schemas/User" },
                            "token": { "type": "string" }
                        },
                        "required": ["user", "token"]
                    },
                    "RegisterUser": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string", "minLength": 2 },
                            "email": { "type": "string", "format": "email" },
                            "password": { "type": "string", "minLength": 6 }
                        },
                        "required": ["name", "email", "password"]
                    },
                    "LoginUser": {
                        "type": "object",
                        "properties": {
                            "email": { "type": "string", "format": "email" },
                            "password": { "type": "string" }
                        },
                        "required": ["email", "password"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE users (
                    id            BLOB PRIMARY KEY NOT NULL,
                    name          TEXT NOT NULL,
                    email         TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    created_at    INTEGER NOT NULL
                );
                "#,
        }]
    }
}

pub fn create_module(state: AppState) -> Arc<dyn Module> {
    Arc::new(UsersModule::new(state))
}
