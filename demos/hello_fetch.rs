use fetch_lite::{
    FetchConfig, FetchWorker, Fetcher, RequestDescriptor, RequestOptions, ReqwestTransport,
    TransportConfig,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct Post {
    title: String,
    body: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG=fetch_lite=debug shows the operation lifecycle
    env_logger::init();

    let transport_cfg = TransportConfig::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let cfg = FetchConfig::builder().transport(transport_cfg).build()?;
    let transport = Arc::new(ReqwestTransport::with_config(&cfg.transport)?);

    // Example 1: a plain public GET
    let mut public_post = Fetcher::with_config(transport.clone(), cfg.clone());
    public_post.fetch(
        "https://jsonplaceholder.typicode.com/posts/1",
        RequestOptions::new(),
    );

    let state = public_post.settled().await;
    match (state.error(), state.data_as::<Post>()) {
        (Some(e), _) => println!("Public post error: {e}"),
        (None, Some(Ok(post))) => println!("{}\n{}\n", post.title, post.body),
        (None, Some(Err(e))) => println!("Public post has an unexpected shape: {e}"),
        (None, None) => println!("Public post is still loading"),
    }

    // Example 2: an authenticated POST through a worker handle
    let options = RequestOptions::new()
        .method("POST")
        .bearer_auth("123-ABC-XYZ-789")
        .json_body(&json!({
            "title": "Hello world",
            "body": "This is a test post.",
            "userId": 1,
        }))?;

    let (handle, join) = FetchWorker::spawn(Fetcher::with_config(transport, cfg));
    handle
        .request(RequestDescriptor::new(
            "https://jsonplaceholder.typicode.com/posts",
            options,
        ))
        .await?;

    let state = handle.settled().await;
    match (state.error(), state.data()) {
        (Some(e), _) => println!("Authenticated request error: {e}"),
        (None, Some(data)) => println!("Server response:\n{}", serde_json::to_string_pretty(data)?),
        (None, None) => println!("Authenticated request is still loading"),
    }

    handle.detach().await?;
    join.await?;

    Ok(())
}
