use mock_server::{IdField, MockServer};
use tokio::net::TcpListener;

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    init_tracing();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let id_field = match std::env::var("ID_FIELD") {
        Ok(raw) => IdField::parse(&raw).unwrap_or_else(|| {
            tracing::warn!(value = %raw, "ID_FIELD must be `_id` or `id`, using `_id`");
            IdField::default()
        }),
        Err(_) => IdField::default(),
    };

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, id_field = id_field.key(), "serving todos under /api");
    MockServer::new(id_field).serve(listener).await
}
