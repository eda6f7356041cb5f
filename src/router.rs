use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::config::Config;
use crate::crypto::FieldCipher;
use crate::db::Database;
use crate::handlers::{admin, auth, bank_accounts, oauth, transactions};

#[derive(Clone)]
pub struct TallyState {
    pub db: Database,
    pub config: Arc<Config>,
    pub cipher: Arc<FieldCipher>,
}

impl TallyState {
    pub fn new(db: Database, config: Config) -> Self {
        let cipher = Arc::new(FieldCipher::new(&config.encryption_key));
        Self {
            db,
            config: Arc::new(config),
            cipher,
        }
    }
}

pub fn tally_router(state: TallyState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me).delete(auth::delete_me))
        .route(
            "/bank-accounts",
            post(bank_accounts::create).get(bank_accounts::list),
        )
        .route(
            "/bank-accounts/{id}",
            get(bank_accounts::get)
                .put(bank_accounts::update)
                .delete(bank_accounts::deactivate),
        )
        .route("/bank-accounts/{id}/refresh", post(bank_accounts::refresh))
        .route("/bank-accounts/{id}/sync", post(bank_accounts::sync))
        .route(
            "/transactions",
            post(transactions::create).get(transactions::list),
        )
        .route(
            "/transactions/{id}",
            get(transactions::get)
                .put(transactions::update)
                .delete(transactions::delete),
        )
        .route("/oauth/monzo/auth", get(oauth::monzo_auth_url))
        .route("/oauth/callback", get(oauth::callback))
        .route("/admin/reset-database", post(admin::reset_database));

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}
