//! Demo catalog inserted on request when the store holds no books.

use shelf_db::DocumentId;
use shelf_http::Result;
use time::OffsetDateTime;
use tracing::info;

use crate::modules::books::models::CreateBook;
use crate::modules::reviews::models::Review;
use crate::state::AppState;

pub const DEMO_USER_NAME: &str = "Demo Reader";
pub const DEMO_USER_EMAIL: &str = "demo@shelf.local";
pub const DEMO_USER_PASSWORD: &str = "demo-reader";

fn sample_books() -> Vec<CreateBook> {
    let sample = |title: &str, author: &str, genre: &str, year: i32, cover: &str, description: &str| {
        CreateBook {
            title: title.to_string(),
            author: author.to_string(),
            description: Some(description.to_string()),
            genre: Some(genre.to_string()),
            year: Some(year),
            cover_url: Some(cover.to_string()),
        }
    };

    vec![
        sample(
            "Educated",
            "Tara Westover",
            "Memoir",
            2018,
            "https://m.media-amazon.com/images/I/81Y5WuARqpL.jpg",
            "A powerful memoir about resilience and self-invention.",
        ),
        sample(
            "Atomic Habits",
            "James Clear",
            "Self-help",
            2018,
            "https://m.media-amazon.com/images/I/91bYsX41DVL.jpg",
            "Tiny changes, remarkable results.",
        ),
        sample(
            "The Pragmatic Programmer",
            "Andrew Hunt, David Thomas",
            "Programming",
            1999,
            "https://m.media-amazon.com/images/I/41as+WafrFL.jpg",
            "Journey to mastery with pragmatic tips.",
        ),
    ]
}

/// Insert the demo user, books and one review. Returns the number of books
/// inserted, which is 0 when the catalog already has books.
pub async fn seed_demo_data(state: &AppState) -> Result<usize> {
    let existing = state.catalog.count().await?;
    if existing > 0 {
        info!(existing, "seed skipped: catalog already has books");
        return Ok(0);
    }

    let owner = match state.users.find_by_email(DEMO_USER_EMAIL).await? {
        Some(user) => user,
        None => {
            state
                .users
                .create(DEMO_USER_NAME, DEMO_USER_EMAIL, DEMO_USER_PASSWORD)
                .await?
        }
    };

    let mut inserted = Vec::new();
    for sample in sample_books() {
        inserted.push(state.catalog.create(sample, owner.id).await?);
    }

    if let Some(book) = inserted.iter().find(|b| b.title == "Atomic Habits") {
        let now = OffsetDateTime::now_utc();
        state
            .reviews
            .insert(Review {
                id: DocumentId::generate(),
                book_id: book.id,
                user_id: owner.id,
                rating: 5,
                review_text: Some("Small habits, big difference.".to_string()),
                created_at: now,
                updated_at: now,
            })
            .await?;
    }

    info!(books = inserted.len(), owner_id = %owner.id, "seeded demo catalog");
    Ok(inserted.len())
}
