//! Minimal AG-UI producer.
//!
//! Run with `cargo run --example basic_server`, then point the CLI at it:
//! `agui chat "hello" --server http://127.0.0.1:8000`.

use agui_server::AguiRouter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let app = AguiRouter::new().with_cors().build();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
    println!("AG-UI producer listening on http://127.0.0.1:8000");
    axum::serve(listener, app).await?;
    Ok(())
}
