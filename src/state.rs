use std::sync::Arc;

use sqlx::PgPool;

use super::{
    config::Config,
    database::{init_pool, init_schema},
};

pub struct AppState {
    pub config: Config,
    pub pool: PgPool,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let pool = init_pool(&config).await;
        init_schema(&pool).await;

        Arc::new(Self { config, pool })
    }
}
