//! Shows the poller's status line as the bot's "Watching ..." activity.

use std::sync::{Mutex, OnceLock};

use mcwatch_core::StatusDisplay;
use poise::serenity_prelude as serenity;

/// Discord activity sink. Polls that finish before the gateway is ready are
/// dropped; the next one after [`DiscordActivity::attach`] is shown.
#[derive(Default)]
pub struct DiscordActivity {
    ctx: OnceLock<serenity::Context>,
    last: Mutex<Option<String>>,
}

impl DiscordActivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, ctx: serenity::Context) {
        if self.ctx.set(ctx).is_err() {
            tracing::debug!("activity display already attached");
        }
    }
}

impl StatusDisplay for DiscordActivity {
    fn show(&self, text: &str) {
        let Some(ctx) = self.ctx.get() else {
            return;
        };
        // Presence updates are rate limited by the gateway; only send changes.
        let Ok(mut last) = self.last.lock() else {
            return;
        };
        if last.as_deref() == Some(text) {
            return;
        }
        ctx.set_activity(Some(serenity::ActivityData::watching(text)));
        *last = Some(text.to_string());
    }
}
