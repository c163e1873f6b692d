//! Shared test-server bootstrap: binds an ephemeral port, spawns
//! `axum::serve` in the background, and hands back the base URL a
//! `rivetkit_client::ClientConfig` can point at.

use rivetkit::Registry;

pub async fn spawn_server(registry: Registry) -> String {
    let app = registry.handler();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server crashed");
    });

    format!("http://{addr}")
}
