use rapidapi_http::RapidApiClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = RapidApiClient::from_env().map_err(anyhow::Error::msg)?;

    let endpoint = std::env::args().nth(1).unwrap_or_else(|| "/".to_owned());
    let body = client.call(&endpoint).await?;

    println!("{}", String::from_utf8_lossy(&body));
    Ok(())
}
