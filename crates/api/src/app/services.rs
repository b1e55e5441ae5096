//! Service wiring: picks in-memory or Postgres stores and builds the services
//! the handlers call.

use std::sync::Arc;

use sqlx::PgPool;

use shopfront_auth::Hs256Jwt;
use shopfront_infra::db::{self, DbConfig};
use shopfront_infra::store::{
    CartStore, InMemoryCartStore, InMemoryOrderStore, InMemoryProductStore, InMemoryUserStore, OrderStore,
    PostgresCartStore, PostgresOrderStore, PostgresProductStore, PostgresUserStore, ProductStore, StoreError,
    UserStore,
};
use shopfront_infra::{AccountSettings, Accounts, Carts, Catalog, OrderLifecycle, UploadIngestor};

use crate::config::AppConfig;

pub struct AppServices {
    pub catalog: Catalog,
    pub orders: OrderLifecycle,
    pub carts: Carts,
    pub accounts: Accounts,
    pub uploads: UploadIngestor,
    /// `memory` or `postgres`, reported by `/health`.
    pub storage: &'static str,
    pool: Option<PgPool>,
}

struct Stores {
    products: Arc<dyn ProductStore>,
    orders: Arc<dyn OrderStore>,
    users: Arc<dyn UserStore>,
    carts: Arc<dyn CartStore>,
}

fn in_memory_stores() -> Stores {
    Stores {
        products: Arc::new(InMemoryProductStore::new()),
        orders: Arc::new(InMemoryOrderStore::new()),
        users: Arc::new(InMemoryUserStore::new()),
        carts: Arc::new(InMemoryCartStore::new()),
    }
}

fn postgres_stores(pool: &PgPool) -> Stores {
    Stores {
        products: Arc::new(PostgresProductStore::new(pool.clone())),
        orders: Arc::new(PostgresOrderStore::new(pool.clone())),
        users: Arc::new(PostgresUserStore::new(pool.clone())),
        carts: Arc::new(PostgresCartStore::new(pool.clone())),
    }
}

pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    let (stores, pool, storage) = match (&config.database_url, config.use_persistent_stores) {
        (Some(url), true) => {
            let db_config = DbConfig {
                max_connections: config.db_max_connections,
                ..DbConfig::new(url.clone())
            };
            let pool = db::connect(&db_config).await?;
            (postgres_stores(&pool), Some(pool), "postgres")
        }
        _ => (in_memory_stores(), None, "memory"),
    };
    tracing::info!(storage, "stores ready");

    let settings = AccountSettings {
        admin: config.admin.clone(),
        token_ttl: config.jwt_ttl,
        bcrypt_cost: config.bcrypt_cost,
    };
    let jwt = Hs256Jwt::new(config.jwt_secret.as_bytes());

    Ok(AppServices {
        catalog: Catalog::new(stores.products.clone()),
        orders: OrderLifecycle::new(stores.orders, stores.products.clone()),
        carts: Carts::new(stores.carts, stores.products),
        accounts: Accounts::new(stores.users, jwt, settings),
        uploads: UploadIngestor::new(config.upload.clone()),
        storage,
        pool,
    })
}

impl AppServices {
    /// Release the connection pool, if any.
    pub async fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            db::close(pool).await;
        }
    }
}
