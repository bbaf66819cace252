// Bot presence. Only Discord SDK types live here.

use poise::serenity_prelude as serenity;

/// Points people at the help action, e.g. "Watching .help".
pub fn reset_status(ctx: &serenity::Context, prefix: &str) {
    let activity = serenity::ActivityData::watching(format!("{}help", prefix));
    ctx.set_presence(Some(activity), serenity::OnlineStatus::Online);
}

/// Called once the gateway reports ready.
pub fn on_ready(ctx: &serenity::Context, prefix: &str) {
    reset_status(ctx, prefix);
}
