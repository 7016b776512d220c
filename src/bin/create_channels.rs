/// create-discord-channels: create the Discord channels listed in channels.csv.
///
/// Reads `DISCORD_TOKEN` and `DISCORD_SERVER_ID` from the environment.
use chanbridge::{
    creator::{self, CreatorConfig},
    discord::DiscordApiClient,
};

#[tokio::main]
async fn main() {
    chanbridge::init_tracing();
    let config = match CreatorConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            println!("Error: {}", err);
            return;
        }
    };
    let mut client = DiscordApiClient::new(config.token.clone());
    if let Err(err) = creator::run(&mut client, &config).await {
        tracing::debug!(error = %err, "run stopped early");
    }
}
