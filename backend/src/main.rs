use tracing::info;
use tracing_subscriber::EnvFilter;

#[rocket::main]
async fn main() -> Result<(), rocket::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🚀 Starting voting service");
    let _rocket = backend::rocket().launch().await?;
    Ok(())
}
