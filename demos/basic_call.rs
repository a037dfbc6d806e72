//! Describe a small API surface and invoke it.
//!
//! Run with: `cargo run --example basic_call`

use declarest::{ApiDescription, Arg, Operation, Pipeline, RestClient};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Todo {
    id: u32,
    title: String,
    completed: bool,
}

#[tokio::main]
async fn main() -> Result<(), declarest::Error> {
    let api = ApiDescription::new("TodoService")
        .host("https://jsonplaceholder.typicode.com")
        .operation(
            Operation::get("getTodo", "/todos/{id}")
                .path_param("id")
                .expect_status([200]),
        );

    let client = RestClient::builder()
        .description(api)
        .pipeline(Pipeline::builder().build())
        .build()?;

    let todo: Todo = client.invoke("getTodo", vec![Arg::text("1")]).await?;
    println!("#{} {:?} (completed: {})", todo.id, todo.title, todo.completed);

    Ok(())
}
