//! Voice Sentry Discord bot
//!
//! Binds the sentry engine to Discord: serenity for the gateway and member
//! moderation, songbird for voice receive and clip playback, Google Cloud
//! Speech for transcription. `!start sentry` in a text channel starts
//! watching the commanding member's voice channel; `!end sentry` stops.

mod adapters;
mod google_stt;
mod receiver;

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serenity::all::{GatewayIntents, Message, Ready};
use serenity::client::{Client, Context, EventHandler};
use songbird::driver::DecodeMode;
use songbird::{Config as SongbirdConfig, SerenityInit};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sentry_core::{
    ClipPlayer, Enforcer, Notifier, NotifyTarget, PhraseCatalog, ScriptedTranscriber, SentryConfig,
    SessionController, TallyBoard, Transcriber, VoiceControl, VoiceLink, VoiceTarget, WindowReset,
};

use adapters::{ChannelNotifier, DiscordVoice};
use google_stt::GoogleTranscriber;

const START_COMMAND: &str = "!start sentry";
const END_COMMAND: &str = "!end sentry";

struct Wiring {
    controller: SessionController,
    notifier: Arc<ChannelNotifier>,
}

struct Handler {
    config: SentryConfig,
    tally: Arc<TallyBoard>,
    wiring: OnceLock<Wiring>,
}

impl Handler {
    async fn say(&self, ctx: &Context, msg: &Message, text: &str) {
        if let Err(e) = msg.channel_id.say(&ctx.http, text).await {
            warn!(error = %e, "failed to reply in command channel");
        }
    }

    async fn start_sentry(&self, ctx: &Context, msg: &Message) {
        let Some(wiring) = self.wiring.get() else {
            return;
        };
        self.say(ctx, msg, "starting sentry").await;

        // Resolve the commanding member's voice channel without holding the
        // cache ref across an await
        let target = {
            msg.guild(&ctx.cache).and_then(|guild| {
                guild
                    .voice_states
                    .get(&msg.author.id)
                    .and_then(|vs| vs.channel_id)
                    .map(|channel| VoiceTarget {
                        guild_id: guild.id.get(),
                        channel_id: channel.get(),
                    })
            })
        };
        let Some(target) = target else {
            self.say(ctx, msg, "join a voice channel first").await;
            return;
        };

        wiring.notifier.set_target(msg.channel_id).await;
        match wiring
            .controller
            .start(target, Some(NotifyTarget(msg.channel_id.get())))
            .await
        {
            Ok(()) => {}
            Err(e) => {
                wiring.notifier.clear().await;
                self.say(ctx, msg, &e.to_string()).await;
            }
        }
    }

    async fn end_sentry(&self, ctx: &Context, msg: &Message) {
        let Some(wiring) = self.wiring.get() else {
            return;
        };
        match wiring.controller.end().await {
            Ok(()) => {
                self.say(ctx, msg, "ending sentry").await;
                wiring.notifier.clear().await;
            }
            Err(e) => self.say(ctx, msg, &e.to_string()).await,
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("bot connected as {}", ready.user.name);

        let songbird = songbird::get(&ctx)
            .await
            .expect("songbird registered at client init");

        let voice = Arc::new(DiscordVoice::new(
            ctx.http.clone(),
            ctx.cache.clone(),
            songbird,
            reqwest::Client::new(),
        ));
        let notifier = Arc::new(ChannelNotifier::new(ctx.http.clone()));

        let transcriber: Arc<dyn Transcriber> = match GoogleTranscriber::from_env() {
            Ok(google) => Arc::new(google),
            Err(e) => {
                warn!(error = %e, "speech recognition unavailable, captures will match nothing");
                Arc::new(ScriptedTranscriber::default())
            }
        };

        let enforcer = Arc::new(Enforcer::new(
            self.config.clone(),
            Arc::clone(&self.tally),
            Arc::clone(&voice) as Arc<dyn VoiceControl>,
            Arc::clone(&voice) as Arc<dyn ClipPlayer>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        ));
        let controller = SessionController::new(
            &self.config,
            PhraseCatalog::standard(),
            transcriber,
            enforcer,
            Arc::clone(&voice) as Arc<dyn VoiceLink>,
        );
        voice.bind_controller(controller.clone()).await;

        // Reconnects fire ready again; the first wiring stays in place
        let _ = self.wiring.set(Wiring {
            controller,
            notifier,
        });
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        match msg.content.trim() {
            START_COMMAND => self.start_sentry(&ctx, &msg).await,
            END_COMMAND => self.end_sentry(&ctx, &msg).await,
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[sentry-bot] .env not loaded: {e} (using system environment)");
    }

    // SENTRY_DEBUG=1 turns on engine debug logging unless RUST_LOG overrides
    let default_filter = if std::env::var("SENTRY_DEBUG").map(|v| v == "1").unwrap_or(false) {
        "info,sentry_core=debug,sentry_bot=debug"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let token = std::env::var("SENTRY_DISCORD_TOKEN").expect("SENTRY_DISCORD_TOKEN must be set");
    let config = SentryConfig::from_env();
    let tally = Arc::new(TallyBoard::new());

    // Process-lifetime reset timer; runs whether or not a session is active
    let _window_reset = WindowReset::spawn(Arc::clone(&tally), config.window_period);

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    // DecodeMode must be set at init to receive decoded voice packets
    let songbird_config = SongbirdConfig::default().decode_mode(DecodeMode::Decode);

    let mut client = Client::builder(&token, intents)
        .event_handler(Handler {
            config,
            tally,
            wiring: OnceLock::new(),
        })
        .register_songbird_from_config(songbird_config)
        .await
        .expect("failed to create Discord client");

    tokio::select! {
        result = client.start() => {
            if let Err(e) = result {
                error!(error = %e, "client error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("CTRL-C received; shutting down");
        }
    }
}
