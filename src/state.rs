use std::sync::Arc;

use axum::extract::FromRef;
use shelf_authz::TokenIssuer;
use shelf_db::Database;
use shelf_kernel::settings::Settings;

use crate::modules::books::{catalog::BookCatalog, listing::ListingPipeline};
use crate::modules::reviews::{aggregator::RatingAggregator, store::ReviewStore};
use crate::modules::users::directory::UserDirectory;

/// Services shared by every module's handlers.
#[derive(Clone)]
pub struct AppState {
    pub catalog: BookCatalog,
    pub reviews: ReviewStore,
    pub listing: ListingPipeline,
    pub users: UserDirectory,
    pub tokens: Arc<TokenIssuer>,
}

impl AppState {
    pub fn new(db: &Database, settings: &Settings) -> Self {
        let tokens = Arc::new(TokenIssuer::from_settings(&settings.auth));
        let users = UserDirectory::new(db, Arc::clone(&tokens));
        let reviews = ReviewStore::new(db, Arc::new(users.clone()));
        let catalog = BookCatalog::new(db, reviews.clone());
        let listing = ListingPipeline::new(catalog.clone(), RatingAggregator::new(db));

        Self {
            catalog,
            reviews,
            listing,
            users,
            tokens,
        }
    }
}

impl FromRef<AppState> for Arc<TokenIssuer> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.tokens)
    }
}
