use ::serenity::all::ClientBuilder;
use dotenv::dotenv;
use jukebox::events::Handler;
use jukebox::{
    Config, Data, Error, Player, SerenityMessenger, SongbirdTransport, YoutubeResolver,
};
use poise::serenity_prelude as serenity;
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize logging with debug level for our crate
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("jukebox=debug,warn")),
        )
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true)
        .with_ansi(true)
        .pretty()
        .init();

    dotenv().ok();

    let config = Config::from_env()?;

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    // The messenger filters cleanup scans by our own user id
    let http = Arc::new(serenity::Http::new(&config.token));
    let bot_id = http.get_current_user().await?.id;

    let songbird = Songbird::serenity();
    let player = Player::new(
        Arc::new(YoutubeResolver::default()),
        Arc::new(SongbirdTransport::new(
            Arc::clone(&songbird),
            reqwest::Client::new(),
            config.player.stream_policy(),
        )),
        Arc::new(SerenityMessenger::new(Arc::clone(&http), bot_id)),
        config.player.clone(),
    );

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: jukebox::commands(),
            ..Default::default()
        })
        .setup({
            let player = player.clone();
            move |ctx, ready, framework| {
                Box::pin(async move {
                    info!("Logged in as {}", ready.user.name);
                    poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                    Ok(Data { player })
                })
            }
        });

    let mut client = ClientBuilder::new(&config.token, intents)
        .framework(framework.build())
        .event_handler(Handler::new(player))
        .register_songbird_with(songbird)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    client.start().await.map_err(Into::into)
}
