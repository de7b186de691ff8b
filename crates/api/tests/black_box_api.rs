use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Value, json};

use cook_api::app::services::spawn_create_order_worker;
use cook_api::app::{AppServices, build_app};
use cook_infra::{QueuePurpose, QueueSettings, WorkerHandle};
use cook_messaging::{InMemoryQueue, QueueTransport, ReceiveOptions};

struct TestServer {
    base_url: String,
    queue: Arc<InMemoryQueue>,
    settings: QueueSettings,
    services: Arc<AppServices>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let queue = Arc::new(InMemoryQueue::default());
        let mut settings = QueueSettings::local("cook");
        settings.receive = ReceiveOptions::default().with_wait(Duration::from_millis(20));

        let services = Arc::new(AppServices::in_memory(queue.clone(), &settings).unwrap());
        let app = build_app(services.clone());

        // Same router as prod, bound to an ephemeral port.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            queue,
            settings,
            services,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn sent(&self, purpose: QueuePurpose) -> Vec<Value> {
        self.queue
            .bodies(&self.settings.channel(purpose).unwrap())
            .iter()
            .map(|b| serde_json::from_str(b).unwrap())
            .collect()
    }

    fn start_create_order_worker(&self) -> WorkerHandle {
        spawn_create_order_worker(self.queue.clone(), &self.settings, self.services.orders.clone())
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn create_product(client: &reqwest::Client, server: &TestServer, body: Value) -> Value {
    let res = client
        .post(server.url("/products"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

async fn get_order_eventually(client: &reqwest::Client, server: &TestServer, id: &str) -> Value {
    // The listener runs on its own task; poll briefly until it has stored the order.
    for _ in 0..100 {
        let res = client
            .get(server.url(&format!("/orders/{id}")))
            .send()
            .await
            .unwrap();

        if res.status() == StatusCode::OK {
            return res.json().await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("order was not created from the queue within timeout");
}

#[tokio::test]
async fn health_is_ok() {
    let server = TestServer::spawn().await;

    let res = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn product_lifecycle_over_http() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let created = create_product(
        &client,
        &server,
        json!({"name": "X-Bacon", "category": "MAIN_COURSE", "price": 25.9, "description": "house burger"}),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["status"], "ACTIVE");
    assert_eq!(created["price"], 25.9);

    let fetched: Value = client
        .get(server.url(&format!("/products/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["name"], "X-Bacon");

    let res = client
        .put(server.url(&format!("/products/{id}")))
        .json(&json!({"name": "X-Bacon Duplo", "category": "MAIN_COURSE", "price": 31.5}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["name"], "X-Bacon Duplo");
    assert_eq!(updated["createdAt"], created["createdAt"]);

    let res = client
        .delete(server.url(&format!("/products/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let inactive: Value = res.json().await.unwrap();
    assert_eq!(inactive["status"], "INACTIVE");

    // one message per change, each on its own queue
    assert_eq!(server.sent(QueuePurpose::ProductCreated).len(), 1);
    assert_eq!(server.sent(QueuePurpose::ProductUpdated)[0]["name"], "X-Bacon Duplo");
    assert_eq!(server.sent(QueuePurpose::ProductInactivated)[0]["status"], "INACTIVE");

    let all: Value = client
        .get(server.url("/products"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn category_listing_pages_active_products() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for (name, price) in [("Soda", 6.0), ("Juice", 8.5), ("Water", 4.0)] {
        create_product(&client, &server, json!({"name": name, "category": "DRINK", "price": price})).await;
    }

    let res = client
        .get(server.url("/products/category?category=DRINK&page=0&size=2"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let page: Value = res.json().await.unwrap();
    assert_eq!(page["totalElements"], 3);
    assert_eq!(page["totalPages"], 2);
    assert_eq!(page["hasNext"], true);
    assert_eq!(page["hasPrevious"], false);
    assert_eq!(page["content"].as_array().unwrap().len(), 2);
    assert_eq!(page["content"][0]["name"], "Soda");

    let res = client
        .get(server.url("/products/category?category=DESSERT"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(server.url("/products/category"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn errors_share_one_body_shape() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let missing = uuid::Uuid::now_v7();
    let res = client
        .get(server.url(&format!("/products/{missing}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["statusCode"], 404);
    assert_eq!(body["message"], format!("Product with id {missing} not found"));
    assert_eq!(body["path"], format!("/products/{missing}"));
    assert!(body["timestamp"].is_string());

    let res = client
        .delete(server.url(&format!("/products/{missing}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], format!("Product with id {missing} not found"));
    assert!(server.sent(QueuePurpose::ProductInactivated).is_empty());

    let res = client
        .post(server.url("/products"))
        .json(&json!({"name": "Gum", "category": "DESSERT", "price": 0.001}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(server.sent(QueuePurpose::ProductCreated).is_empty());

    let res = client
        .get(server.url("/products/not-a-uuid"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(server.url("/products"))
        .json(&json!({"name": "Free lunch", "category": "MAIN_COURSE", "price": 0}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["statusCode"], 400);

    let res = client
        .post(server.url("/products"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client.get(server.url("/nowhere")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Cannot GET /nowhere");
}

#[tokio::test]
async fn queued_order_moves_forward_and_is_announced() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let worker = server.start_create_order_worker();

    let product = create_product(
        &client,
        &server,
        json!({"name": "Brownie", "category": "DESSERT", "price": 12.0}),
    )
    .await;
    let order_id = uuid::Uuid::now_v7().to_string();
    let message = json!({
        "id": order_id,
        "sequence": 42,
        "status": "RECEIVED",
        "products": [{"id": product["id"], "customization": "warm"}],
    });
    server
        .queue
        .send(&server.settings.channel(QueuePurpose::OrderCreated).unwrap(), &message.to_string())
        .await
        .unwrap();

    let order = get_order_eventually(&client, &server, &order_id).await;
    assert_eq!(order["status"], "PREPARING");
    assert_eq!(order["sequence"], "42");
    assert_eq!(order["products"][0]["customization"], "warm");

    let res = client
        .patch(server.url(&format!("/orders/{order_id}/status/READY")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let ready: Value = res.json().await.unwrap();
    assert_eq!(ready["status"], "READY");
    assert_eq!(
        server.sent(QueuePurpose::OrderStatusUpdated),
        vec![json!({"orderId": order_id})]
    );

    let res = client
        .patch(server.url(&format!("/orders/{order_id}/status/RECEIVED")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .patch(server.url(&format!("/orders/{order_id}/status/COOKING")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    worker.shutdown().await.unwrap();
}
