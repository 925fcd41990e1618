pub mod aggregator;
pub mod models;
pub mod routes;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use serde_json::json;
use shelf_kernel::{Migration, Module};

use crate::state::AppState;

/// Author-only changes to individual reviews. Listing and submitting
/// reviews live under the books module.
pub struct ReviewsModule {
    state: AppState,
}

impl ReviewsModule {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for ReviewsModule {
    fn name(&self) -> &'static str {
        "reviews"
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

        Some(json!({
            "paths": {
                "/{id}": {
                    "parameters": [
                        { "name": "id", "in": "path", "required": true, "schema": { "type": "string", "format": "uuid" } }
                    ],
                    "put": {
                        "summary": "Update a review (author only)",
                        "tags": ["Reviews"],
                        "security": [{ "bearerAuth": [] }],
                        "requestBody": {
                            "required": true,
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ReviewPatch" } } }
                        },
                        "responses": {
                            "200": {
                                "description": "Updated review",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Review" } } }
                            },
                            "400": error("Validation error"),
                            "401": error("Not authenticated"),
                            "403": error("Not the author"),
                            "404": error("Review not found")
                        }
                    },
                    "delete": {
                        "summary": "Delete a review (author only)",
                        "tags": ["Reviews"],
                        "security": [{ "bearerAuth": [] }],
                        "responses": {
                            "200": { "description": "Deleted" },
                            "401": error("Not authenticated"),
                            "403": error("Not the author"),
                            "404": error("Review not found")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Review": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string", "format": "uuid" },
                            "bookId": { "type": "string", "format": "uuid" },
                            "userId": { "type": "string", "format": "uuid" },
                            "rating": { "type": "integer", "minimum": 1, "maximum": 5 },
                            "reviewText": { "type": "string", "nullable": true },
                            "createdAt": { "type": "string", "format": "date-time" },
                            "updatedAt": { "type": "string", "format": "date-time" }
                        },
                        "required": ["id", "bookId", "userId", "rating", "createdAt", "updatedAt"]
                    },
                    "ReviewPatch": {
                        "type": "object",
                        "description": "Absent fields are unchanged; a null reviewText clears it",
                        "properties": {
                            "rating": { "type": "integer", "minimum": 1, "maximum": 5 },
                            "reviewText": { "type": "string", "nullable": true }
                        }
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE reviews (
                    id          BLOB PRIMARY KEY NOT NULL,
                    book_id     BLOB NOT NULL,
                    user_id     BLOB NOT NULL,
                    rating      INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                    review_text TEXT,
                    created_at  INTEGER NOT NULL,
                    updated_at  INTEGER NOT NULL,
                    UNIQUE (book_id, user_id)
                );
                CREATE INDEX reviews_book ON reviews (book_id, created_at DESC);
                "#,
        }]
    }
}

pub fn create_module(state: AppState) -> Arc<dyn Module> {
    Arc::new(ReviewsModule::new(state))
}
