use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let api_key = std::env::var("VAULT_API_KEY").unwrap_or_else(|_| "test-key".to_string());
    let account_id = std::env::var("VAULT_ACCOUNT_ID").unwrap_or_else(|_| "test-account".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!("vault mock listening on {addr} (account {account_id})");
    mock_server::run(listener, &api_key, &account_id).await
}
