use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use cook_infra::listeners::create_order_listener;
use cook_infra::publishers::{EvolveOrderPublisher, ProductEventPublisher};
use cook_infra::queue::RedisStreamsTransport;
use cook_infra::repositories::{
    InMemoryOrderRepository, InMemoryProductRepository, PostgresOrderRepository,
    PostgresProductRepository,
};
use cook_infra::{
    AppConfig, ConfigError, Database, OrderUseCases, ProductPublishers, ProductUseCases,
    QueueSettings, WorkerHandle, spawn_listener,
};
use cook_messaging::{InMemoryQueue, QueueClient, QueueTransport};
use cook_orders::OrderRepository;
use cook_products::ProductRepository;

/// Use cases the HTTP handlers call into.
#[derive(Clone)]
pub struct AppServices {
    pub products: ProductUseCases,
    pub orders: OrderUseCases,
}

impl AppServices {
    /// Wire use cases over the given repositories, publishing through `transport`.
    ///
    /// Every publisher resolves its queue here; a missing one fails the wiring.
    pub fn new<T>(
        products: Arc<dyn ProductRepository>,
        orders: Arc<dyn OrderRepository>,
        transport: T,
        settings: &QueueSettings,
    ) -> Result<Self, ConfigError>
    where
        T: QueueTransport + Clone + 'static,
    {
        let client = || QueueClient::new(transport.clone());

        let publishers = ProductPublishers {
            created: Arc::new(ProductEventPublisher::created(client(), settings)?),
            updated: Arc::new(ProductEventPublisher::updated(client(), settings)?),
            inactivated: Arc::new(ProductEventPublisher::inactivated(client(), settings)?),
        };
        let evolve = Arc::new(EvolveOrderPublisher::new(client(), settings)?);

        Ok(Self {
            products: ProductUseCases::new(products.clone(), publishers),
            orders: OrderUseCases::new(orders, products, evolve),
        })
    }

    /// In-memory repositories and queue (tests and local runs without backing services).
    pub fn in_memory(queue: Arc<InMemoryQueue>, settings: &QueueSettings) -> Result<Self, ConfigError> {
        Self::new(
            Arc::new(InMemoryProductRepository::new()),
            Arc::new(InMemoryOrderRepository::new()),
            queue,
            settings,
        )
    }
}

/// Start the create-order listener on its own task.
pub fn spawn_create_order_worker<T>(
    transport: T,
    settings: &QueueSettings,
    orders: OrderUseCases,
) -> Result<WorkerHandle, ConfigError>
where
    T: QueueTransport + 'static,
{
    let client = QueueClient::new(transport).with_receive_options(settings.receive);
    let listener = create_order_listener(client, settings, orders)?;
    Ok(spawn_listener(listener, settings.listener_config()))
}

/// Services plus the background workers that must be stopped on shutdown.
pub struct Runtime {
    pub services: Arc<AppServices>,
    pub workers: Vec<WorkerHandle>,
}

/// Production wiring: Postgres repositories and Redis Streams queues.
///
/// Publishers and the listener get separate Redis connections so a blocking
/// read never holds up a publish.
pub async fn build_persistent_services(config: &AppConfig) -> anyhow::Result<Runtime> {
    let db = Arc::new(
        Database::connect(&config.database)
            .await
            .context("connecting to postgres")?,
    );
    db.migrate().await.context("creating schema")?;
    info!("database ready");

    let publish_transport = Arc::new(
        RedisStreamsTransport::connect(&config.queue)
            .await
            .context("connecting publisher to redis")?,
    );
    let listen_transport = RedisStreamsTransport::connect(&config.queue)
        .await
        .context("connecting listener to redis")?;

    let services = AppServices::new(
        Arc::new(PostgresProductRepository::new(db.clone())),
        Arc::new(PostgresOrderRepository::new(db)),
        publish_transport,
        &config.queue,
    )
    .context("wiring publishers")?;

    let worker = spawn_create_order_worker(listen_transport, &config.queue, services.orders.clone())
        .context("wiring create-order listener")?;

    Ok(Runtime {
        services: Arc::new(services),
        workers: vec![worker],
    })
}
