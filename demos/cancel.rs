use std::time::Duration;

use rapidapi_http::{CancellationToken, RapidApiClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = RapidApiClient::from_env().map_err(anyhow::Error::msg)?;
    let endpoint = std::env::args().nth(1).unwrap_or_else(|| "/".to_owned());

    // Give up after two seconds, retry backoff waits included.
    let cancel = CancellationToken::new();
    let deadline = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        deadline.cancel();
    });

    match client.call_with_cancel(&endpoint, &cancel).await {
        Ok(body) => println!("{}", String::from_utf8_lossy(&body)),
        Err(err) => eprintln!("call failed: {err}"),
    }

    Ok(())
}
