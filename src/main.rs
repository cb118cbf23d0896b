use albumscrap::{
    cli::Cli, info_time, read_cookie_file, Error, HttpTransport, Result, SessionClient,
};
use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let start_time = Local::now();
    let cli = Cli::parse();
    let client = connect(&cli).await?;

    let json = match cli.album_id {
        Some(album_id) if cli.all => {
            serde_json::to_string_pretty(&client.get_full_photo_list(cli.scope, album_id).await?)?
        }
        Some(album_id) => serde_json::to_string_pretty(
            &client.fetch_photo_list(cli.scope, album_id, cli.page).await?,
        )?,
        None if cli.all => {
            serde_json::to_string_pretty(&client.get_full_album_list(cli.scope).await?)?
        }
        None => serde_json::to_string_pretty(&client.fetch_album_list(cli.scope, cli.page).await?)?,
    };

    let path = cli.output_path();
    tokio::fs::write(&path, json).await?;
    info_time!(start_time, "Wrote {}", path.display());

    Ok(())
}

/// Reuses the cookie file's session when there is one, logs in otherwise.
async fn connect(cli: &Cli) -> Result<SessionClient> {
    let transport = HttpTransport::with_config(cli.transport_config())?;

    if let Some(path) = &cli.cookie_file {
        if let Some(cookie_string) = read_cookie_file(path).await? {
            info_time!("Using session from {}", path.display());
            return Ok(SessionClient::from_cookie_string(
                transport,
                cookie_string,
                cli.username.as_str(),
            ));
        }
    }

    let password = cli
        .password
        .as_deref()
        .ok_or_else(|| Error::Validation("password is required".into()))?;
    SessionClient::login_with(transport, &cli.username, password).await
}
