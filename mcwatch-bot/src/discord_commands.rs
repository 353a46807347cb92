use crate::Context;
use mcwatch_bot::messages;
use mcwatch_bot::validation::validate_player_name;
use mcwatch_core::{Identity, VerifyError};
use poise::command;
use poise::serenity_prelude as serenity;
use std::time::Duration;

pub(crate) type Error = Box<dyn std::error::Error + Send + Sync>;

const THUMBS_UP: &str = "👍";

/// Displays the number of users on the server and their usernames.
#[command(slash_command, prefix_command)]
pub async fn online(ctx: Context<'_>) -> Result<(), Error> {
    let snapshot = ctx.data().cache.current();
    ctx.say(messages::online(&snapshot)).await?;
    Ok(())
}

/// Just see what happens...
#[command(slash_command, prefix_command)]
pub async fn shame(ctx: Context<'_>) -> Result<(), Error> {
    let top = ctx.data().ledger.highest_accrual().await;
    ctx.say(messages::shame(top)).await?;
    Ok(())
}

/// Shows your total playtime, or another verified player's
#[command(slash_command, prefix_command)]
pub async fn playtime(
    ctx: Context<'_>,
    #[description = "Discord username or mention (optional)"]
    #[rest]
    name: Option<String>,
) -> Result<(), Error> {
    let ledger = &ctx.data().ledger;
    let text = match name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        None => {
            let own = ledger
                .find_by_identity_id(&ctx.author().id.get().to_string())
                .await;
            messages::own_playtime(own.as_ref().map(|(_, entry)| entry), ctx.prefix())
        }
        Some(query) => {
            let entry = match ledger.resolve_player_by_identity(query).await {
                Some(player) => ledger.entry(&player).await,
                None => None,
            };
            messages::playtime_of(query, entry.as_ref())
        }
    };
    ctx.say(text).await?;
    Ok(())
}

/// Checks if bot is alive
#[command(slash_command, prefix_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    let guild = ctx
        .guild_id()
        .map(|id| id.get().to_string())
        .unwrap_or_else(|| "None".to_string());
    ctx.say(format!(
        "pong :wink: (from user {} on server {} channel {})",
        ctx.author().id,
        guild,
        ctx.channel_id()
    ))
    .await?;
    Ok(())
}

/// Gives the Minecraft username of a verified Discord user
#[command(slash_command, prefix_command)]
pub async fn whois(
    ctx: Context<'_>,
    #[description = "Discord username or mention"]
    #[rest]
    name: Option<String>,
) -> Result<(), Error> {
    let Some(query) = name.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
        ctx.say("Please enter a discord username.").await?;
        return Ok(());
    };
    let player = ctx.data().ledger.resolve_player_by_identity(query).await;
    ctx.say(messages::whois(query, player)).await?;
    Ok(())
}

/// Link your Discord account to your Minecraft username
#[command(slash_command, prefix_command)]
pub async fn verify(
    ctx: Context<'_>,
    #[description = "Minecraft username"] player: Option<String>,
) -> Result<(), Error> {
    let Some(player) = player else {
        ctx.say("Please enter your minecraft username.").await?;
        return Ok(());
    };
    if let Err(e) = validate_player_name(&player) {
        ctx.say(e.to_string()).await?;
        return Ok(());
    }

    let data = ctx.data();
    let requester = Identity::new(ctx.author().name.clone(), ctx.author().id.get().to_string());
    let pending = match data.verifier.begin(&player, requester).await {
        Ok(pending) => pending,
        Err(VerifyError::AlreadyLinked(_)) => {
            ctx.say("Your account has already been verified!").await?;
            return Ok(());
        }
        Err(VerifyError::UnknownPlayer(_)) => {
            ctx.say("I don't recognize that username. (Make sure you've joined the server before!)")
                .await?;
            return Ok(());
        }
        Err(VerifyError::AlreadyInProgress(_)) => {
            ctx.say(format!("A verification for {player} is already running."))
                .await?;
            return Ok(());
        }
    };

    match confirm(ctx, data.confirm_timeout).await {
        Ok(true) => {}
        Ok(false) => {
            pending.cancel();
            return Ok(());
        }
        Err(e) => {
            pending.cancel();
            return Err(e);
        }
    }

    let http = ctx.serenity_context().http.clone();
    let channel = ctx.channel_id();
    tokio::spawn(async move {
        let outcome = pending.run().await;
        if let Err(e) = channel.say(&http, outcome.message()).await {
            tracing::warn!(error = %e, "failed to report verification outcome");
        }
    });
    Ok(())
}

/// Post the instructions and wait for the author's thumbs up.
async fn confirm(ctx: Context<'_>, timeout: Duration) -> Result<bool, Error> {
    let reply = ctx.say(messages::VERIFY_INSTRUCTIONS).await?;
    let message = reply.message().await?.into_owned();
    message
        .react(ctx.http(), serenity::ReactionType::Unicode(THUMBS_UP.to_string()))
        .await?;

    let reaction = message
        .await_reaction(ctx.serenity_context())
        .author_id(ctx.author().id)
        .filter(|reaction| reaction.emoji.unicode_eq(THUMBS_UP))
        .timeout(timeout)
        .await;
    if reaction.is_none() {
        tracing::debug!(user = %ctx.author().name, "verification not confirmed in time");
        return Ok(false);
    }

    if let Err(e) = message
        .delete_reaction(
            ctx.http(),
            None,
            serenity::ReactionType::Unicode(THUMBS_UP.to_string()),
        )
        .await
    {
        tracing::debug!(error = %e, "could not remove own reaction");
    }
    Ok(true)
}
