use rest_dedup_client::{CallOptions, RestClient, Verb};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("🚀 Testing request deduplication against a public API");

    println!("\n1️⃣ Building client and registering endpoints...");
    let client = RestClient::builder()
        .host_url("https://jsonplaceholder.typicode.com")
        .build();
    client.define_endpoint(Verb::Get, "/todos/{{id}}", |payload| {
        println!("   📦 callback received: {payload}");
    });

    println!("2️⃣ Issuing the same call three times back to back...");
    for attempt in 1..=3 {
        let launched = client.call_with(
            "/todos/{{id}}",
            Verb::Get,
            CallOptions::new().with_path_var("id", "1"),
        )?;
        println!("   attempt {attempt}: launched = {launched}");
    }

    let stats = client.in_flight_stats();
    println!("   📈 in-flight stats: {stats:?}");

    println!("3️⃣ Waiting for the single network operation to resolve...");
    tokio::time::sleep(Duration::from_secs(2)).await;

    println!("4️⃣ Calling again after resolution (should launch)...");
    let launched = client.call_with(
        "/todos/{{id}}",
        Verb::Get,
        CallOptions::new().with_path_var("id", "1"),
    )?;
    println!("   relaunch: launched = {launched}");

    tokio::time::sleep(Duration::from_secs(2)).await;
    println!("\n✅ Done");
    Ok(())
}
