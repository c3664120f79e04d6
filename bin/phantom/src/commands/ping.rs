use phantom_host::RpcClient;

pub async fn run(port: u16) -> anyhow::Result<()> {
    let client = RpcClient::new(port);
    client.ping().await?;
    println!("✓ {} is ready", client.base_url());
    Ok(())
}
