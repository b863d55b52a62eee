use std::time::Duration;

use casework_http::{CacheOptions, CacheStrategy, FailSoft, HttpClient, RequestSpec};
use serde_json::{json, Value};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = HttpClient::from_env().map_err(anyhow::Error::msg)?;

    let cases: Value = client
        .get(
            "/cases?workspace=workspace-1",
            Some(CacheOptions::new(
                Duration::from_secs(30),
                CacheStrategy::NetworkFirst,
            )),
        )
        .await?;
    println!("cases: {cases}");

    let templates: Value = client
        .read_only(RequestSpec::get("/templates?workspace=workspace-1"))
        .await
        .fail_soft(|| json!([]));
    println!("templates: {templates}");

    client.invalidate_cache("workspace-1");
    Ok(())
}
