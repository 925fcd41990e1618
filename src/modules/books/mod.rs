pub mod catalog;
pub mod listing;
pub mod models;
pub mod routes;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use serde_json::json;
use shelf_kernel::{InitCtx, Migration, Module};

use crate::state::AppState;

/// Book catalog, listing with ratings, and per-book reviews
pub struct BooksModule {
    state: AppState,
}

impl BooksModule {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let books = self.state.catalog.count().await?;
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            books,
            "books module initialized"
        );
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
        let json_body = |schema: &str| {
            json!({ "application/json": { "schema": { "$ref": format!("#/components/schemas/{}", schema) } } })
        };
        let id_param = |name: &str| {
            json!({ "name": name, "in": "path", "required": true, "schema": { "type": "string", "format": "uuid" } })
        };

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List books with ratings",
                        "tags": ["Books"],
                        "parameters": [
                            { "name": "q", "in": "query", "schema": { "type": "string" }, "description": "Substring of title or author" },
                            { "name": "genre", "in": "query", "schema": { "type": "string" } },
                            { "name": "author", "in": "query", "schema": { "type": "string" } },
                            {
                                "name": "sort",
                                "in": "query",
                                "schema": {
                                    "type": "string",
                                    "enum": ["created_desc", "year_desc", "year_asc", "rating_desc", "rating_asc"]
                                },
                                "description": "Rating orders reorder the selected page only"
                            },
                            { "name": "page", "in": "query", "schema": { "type": "integer", "minimum": 1 } }
                        ],
                        "responses": {
                            "200": { "description": "One page of books", "content": json_body("BookPage") },
                            "400": error("Invalid page")
                        }
                    },
                    "post": {
                        "summary": "Create a book",
                        "tags": ["Books"],
                        "security": [{ "bearerAuth": [] }],
                        "requestBody": { "required": true, "content": json_body("CreateBook") },
                        "responses": {
                            "201": { "description": "Created book", "content": json_body("Book") },
                            "400": error("Validation error"),
                            "401": error("Not authenticated")
                        }
                    }
                },
                "/{id}": {
                    "parameters": [id_param("id")],
                    "get": {
                        "summary": "Get a book with its rating summary",
                        "tags": ["Books"],
                        "responses": {
                            "200": { "description": "Book", "content": json_body("BookWithRating") },
                            "400": error("Invalid book id"),
                            "404": error("Book not found")
                        }
                    },
                    "put": {
                        "summary": "Update a book (owner only)",
                        "tags": ["Books"],
                        "security": [{ "bearerAuth": [] }],
                        "requestBody": { "required": true, "content": json_body("BookPatch") },
                        "responses": {
                            "200": { "description": "Updated book", "content": json_body("Book") },
                            "400": error("Validation error"),
                            "401": error("Not authenticated"),
                            "403": error("Not the owner"),
                            "404": error("Book not found")
                        }
                    },
                    "delete": {
                        "summary": "Delete a book and its reviews (owner only)",
                        "tags": ["Books"],
                        "security": [{ "bearerAuth": [] }],
                        "responses": {
                            "200": { "description": "Deleted" },
                            "401": error("Not authenticated"),
                            "403": error("Not the owner"),
                            "404": error("Book not found")
                        }
                    }
                },
                "/{id}/reviews": {
                    "parameters": [id_param("id")],
                    "get": {
                        "summary": "List reviews of a book, newest first",
                        "tags": ["Reviews"],
                        "responses": {
                            "200": {
                                "description": "Reviews",
                                "content": {
                                    "application/json": {
                                        "schema": { "type": "array", "items": { "$ref": "#/components/schemas/ReviewWithAuthor" } }
                                    }
                                }
                            },
                            "400": error("Invalid book id")
                        }
                    },
                    "post": {
                        "summary": "Add or replace the caller's review of a book",
                        "tags": ["Reviews"],
                        "security": [{ "bearerAuth": [] }],
                        "requestBody": { "required": true, "content": json_body("ReviewInput") },
                        "responses": {
                            "201": { "description": "Saved review", "content": json_body("Review") },
                            "400": error("Validation error"),
                            "401": error("Not authenticated"),
                            "404": error("Book not found")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string", "format": "uuid" },
                            "title": { "type": "string" },
                            "author": { "type": "string" },
                            "description": { "type": "string" },
                            "genre": { "type": "string", "nullable": true },
                            "year": { "type": "integer", "nullable": true, "minimum": 0 },
                            "coverUrl": { "type": "string", "nullable": true },
                            "ownerId": { "type": "string", "format": "uuid" },
                            "createdAt": { "type": "string", "format": "date-time" },
                            "updatedAt": { "type": "string", "format": "date-time" }
                        },
                        "required": ["id", "title", "author", "description", "ownerId", "createdAt", "updatedAt"]
                    },
                    "BookWithRating": {
                        "allOf": [
                            { "$ref": "#/components/schemas/Book" },
                            {
                                "type": "object",
                                "properties": {
                                    "averageRating": { "type": "number" },
                                    "reviewsCount": { "type": "integer" }
                                },
                                "required": ["averageRating", "reviewsCount"]
                            }
                        ]
                    },
                    "BookPage": {
                        "type": "object",
                        "properties": {
                            "page": { "type": "integer" },
                            "pageCount": { "type": "integer" },
                            "total": { "type": "integer" },
                            "items": { "type": "array", "items": { "$ref": "#/components/schemas/BookWithRating" } }
                        },
                        "required": ["page", "pageCount", "total", "items"]
                    },
                    "CreateBook": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "author": { "type": "string" },
                            "description": { "type": "string" },
                            "genre": { "type": "string" },
                            "year": { "type": "integer", "minimum": 0 },
                            "coverUrl": { "type": "string" }
                        },
                        "required": ["title", "author"]
                    },
                    "BookPatch": {
                        "type": "object",
                        "description": "Absent fields are unchanged; null clears optional fields",
                        "properties": {
                            "title": { "type": "string" },
                            "author": { "type": "string" },
                            "description": { "type": "string", "nullable": true },
                            "genre": { "type": "string", "nullable": true },
                            "year": { "type": "integer", "nullable": true, "minimum": 0 },
                            "coverUrl": { "type": "string", "nullable": true }
                        }
                    },
                    "ReviewInput": {
                        "type": "object",
                        "properties": {
                            "rating": { "type": "integer", "minimum": 1, "maximum": 5 },
                            "reviewText": { "type": "string" }
                        },
                        "required": ["rating"]
                    },
                    "ReviewWithAuthor": {
                        "allOf": [
                            { "$ref": "#/components/schemas/Review" },
                            {
                                "type": "object",
                                "properties": {
                                    "user": {
                                        "type": "object",
                                        "properties": {
                                            "id": { "type": "string", "format": "uuid" },
                                            "name": { "type": "string", "nullable": true }
                                        }
                                    }
                                }
                            }
                        ]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE books (
                    id            BLOB PRIMARY KEY NOT NULL,
                    title         TEXT NOT NULL CHECK (title <> ''),
                    author        TEXT NOT NULL CHECK (author <> ''),
                    description   TEXT NOT NULL DEFAULT '',
                    genre         TEXT,
                    year          INTEGER CHECK (year IS NULL OR year >= 0),
                    cover_url     TEXT,
                    owner_id      BLOB NOT NULL,
                    title_folded  TEXT NOT NULL,
                    author_folded TEXT NOT NULL,
                    genre_folded  TEXT,
                    created_at    INTEGER NOT NULL,
                    updated_at    INTEGER NOT NULL
                );
                CREATE INDEX books_created ON books (created_at DESC, id DESC);
                CREATE INDEX books_year ON books (year, created_at);
                CREATE INDEX books_genre ON books (genre_folded);
                CREATE INDEX books_author ON books (author);
                "#,
        }]
    }
}

pub fn create_module(state: AppState) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(state))
}
