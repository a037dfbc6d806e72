//! Assemble a full pipeline: user-agent, retry, request-id, cookies, decoding.
//!
//! Run with: `cargo run --example pipeline_policies`

use declarest::policies::{
    CookiePolicy, DecodingPolicy, RequestIdPolicy, RetryPolicy, UserAgentPolicy,
};
use declarest::{ApiDescription, Arg, Error, Operation, Pipeline, RestClient, ReturnShape};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let api = ApiDescription::new("HttpBin")
        .host("https://httpbin.org")
        .operation(
            Operation::get("getJson", "/json")
                .returns(ReturnShape::Envelope)
                .expect_status([200]),
        )
        .operation(
            Operation::get("status", "/status/{code}")
                .path_param("code")
                .returns(ReturnShape::Void)
                .expect_status([200]),
        );

    let pipeline = Pipeline::builder()
        .policy(UserAgentPolicy::new("declarest-demo/0.1"))
        .policy(RetryPolicy::new().with_max_retries(2).with_base_delay(Duration::from_millis(200)))
        .policy(RequestIdPolicy::new())
        .policy(CookiePolicy::new())
        .policy(DecodingPolicy::new())
        .timeout(Duration::from_secs(30))
        .build();

    let client = RestClient::builder().description(api).pipeline(pipeline).build()?;

    let envelope = client.invoke_envelope::<serde_json::Value>("getJson", vec![]).await?;
    println!("status: {}", envelope.status);
    println!("content-type: {:?}", envelope.headers.get("content-type"));
    if let Some(body) = &envelope.body {
        println!("body: {body}");
    }

    // 503 responses are retried, then surfaced once retries are exhausted.
    match client.invoke_unit("status", vec![Arg::text("503")]).await {
        Ok(()) => println!("unexpectedly succeeded"),
        Err(Error::UnexpectedStatus { status, .. }) => println!("gave up on {status} after retries"),
        Err(e) => println!("failed: {e}"),
    }

    Ok(())
}
