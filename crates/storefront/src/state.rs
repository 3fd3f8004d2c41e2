//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::db::{
    CartStore, MemoryCatalog, MemoryOrderStore, OrderStore, PgCartStore, PgCatalog, PgOrderStore,
    ProductCatalog, SessionCartStore,
};
use crate::services::cart::CartService;
use crate::services::checkout::{CheckoutService, OrderCharges};
use crate::services::notifications::{LogNotifier, NotificationSink};
use crate::services::orders::OrderService;
use crate::services::payment::{PaymentGateway, SimulatedGateway};

/// The storage backend behind the services.
#[derive(Clone)]
pub struct Stores {
    pub catalog: Arc<dyn ProductCatalog>,
    /// Carts of signed-in users.
    pub user_carts: Arc<dyn CartStore>,
    pub orders: Arc<dyn OrderStore>,
    /// Set when running against Postgres.
    pub pool: Option<PgPool>,
}

impl Stores {
    /// Postgres-backed stores sharing one pool.
    #[must_use]
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            catalog: Arc::new(PgCatalog::new(pool.clone())),
            user_carts: Arc::new(PgCartStore::new(pool.clone())),
            orders: Arc::new(PgOrderStore::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// In-memory stores over `catalog`. User carts live in memory too.
    #[must_use]
    pub fn in_memory(catalog: Arc<MemoryCatalog>) -> Self {
        let user_carts: Arc<dyn CartStore> = Arc::new(SessionCartStore::unbounded());
        Self {
            orders: Arc::new(MemoryOrderStore::new(catalog.clone(), user_carts.clone())),
            catalog,
            user_carts,
            pool: None,
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores")
            .field("postgres", &self.pool.is_some())
            .finish_non_exhaustive()
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the services and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: Option<PgPool>,
    carts: Arc<CartService>,
    checkout: CheckoutService,
    orders: OrderService,
}

impl AppState {
    /// Create application state with the configured simulated gateway and
    /// log notifications.
    #[must_use]
    pub fn new(config: StorefrontConfig, stores: Stores) -> Self {
        let gateway = Arc::new(SimulatedGateway::new(config.card_decline_above));
        Self::with_collaborators(config, stores, gateway, Arc::new(LogNotifier))
    }

    /// Create application state with explicit payment and notification
    /// collaborators.
    #[must_use]
    pub fn with_collaborators(
        config: StorefrontConfig,
        stores: Stores,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let guests = Arc::new(SessionCartStore::new(
            config.guest_cart_capacity,
            config.guest_cart_ttl,
        ));
        let carts = Arc::new(CartService::new(
            stores.catalog.clone(),
            guests,
            stores.user_carts,
            config.currency,
        ));
        let checkout = CheckoutService::new(
            stores.catalog,
            carts.clone(),
            stores.orders.clone(),
            notifier,
            OrderCharges {
                shipping_cost: config.shipping_cost,
                currency: config.currency,
            },
        );
        let orders = OrderService::new(stores.orders, gateway);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool: stores.pool,
                carts,
                checkout,
                orders,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// The database pool, when running against Postgres.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    #[must_use]
    pub fn carts(&self) -> &CartService {
        &self.inner.carts
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }

    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.inner.config)
            .field("postgres", &self.inner.pool.is_some())
            .finish_non_exhaustive()
    }
}
