//! Discord glue: event handling, command dispatch, moderation enforcement.

use crate::llm::ContentPart;
use crate::{BOT_NAME, BotDeps, attachments};

use rand::Rng as _;
use serenity::all::{
    ChannelType, Context, CreateChannel, EditMember, EventHandler, GatewayIntents, GuildId,
    GuildMemberUpdateEvent, Member, Mentionable as _, Message, Ready, UserId,
};
use serenity::async_trait;

/// Discord messages are limited to 2000 characters.
const MAX_MESSAGE_LENGTH: usize = 2000;

/// Serenity event handler carrying the shared dependency bundle.
pub struct Handler {
    deps: BotDeps,
}

impl Handler {
    pub fn new(deps: BotDeps) -> Self {
        Self { deps }
    }

    /// Gateway intents the bot needs: guild messages with content, plus
    /// member events for nickname enforcement.
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
            | GatewayIntents::GUILD_MEMBERS
    }

    fn is_operator(&self, user_id: UserId) -> bool {
        self.deps.config.operator_id == Some(user_id.get())
    }

    /// Full per-message pipeline: command dispatch, moderation, gate,
    /// memory, generation, reply.
    async fn handle_message(&self, ctx: &Context, msg: &Message) -> crate::Result<()> {
        let channel_id = msg.channel_id.to_string();
        let user_id = msg.author.id.to_string();
        let text = msg.content.clone();

        if let Some((command, rest)) = parse_command(&text) {
            return self.dispatch_command(ctx, msg, command, rest).await;
        }

        // Moderation first. Flagged users get their label re-applied when it
        // has drifted, and nothing else.
        if let Some(label) = self.deps.moderation.label_of(&user_id) {
            let observed = msg.member.as_ref().and_then(|m| m.nick.as_deref());
            if observed != Some(label.as_str())
                && let Some(guild_id) = msg.guild_id
                && let Err(error) = self
                    .apply_nickname(ctx, guild_id, msg.author.id, &label)
                    .await
            {
                tracing::warn!(%error, %user_id, %label, "corrective rename failed");
            }
            return Ok(());
        }

        let roll = rand::rng().random::<f64>();
        if let Some(kind) = self.deps.moderation.classify(&text, false, roll) {
            return self.flag_user(ctx, msg, kind).await;
        }

        let roll = rand::rng().random::<f64>();
        if !self
            .deps
            .gate
            .should_respond(&channel_id, &text, msg.author.bot, roll)
        {
            return Ok(());
        }

        self.reply_in_character(ctx, msg, &channel_id, &user_id, &text)
            .await
    }

    /// Append the message to memory, compose the prompt, call the backend,
    /// and send the (possibly fallback) reply.
    async fn reply_in_character(
        &self,
        ctx: &Context,
        msg: &Message,
        channel_id: &str,
        user_id: &str,
        text: &str,
    ) -> crate::Result<()> {
        let speaker = self
            .deps
            .aliases
            .get(user_id)
            .unwrap_or_else(|| msg.author.display_name().to_string());

        self.deps.memory.append(channel_id, &speaker, text);

        // Attachments: readable documents extend the prompt text, images ride
        // along as inline parts.
        let mut prompt_text = format!("{speaker}: {text}");
        let mut image_parts = Vec::new();
        for attachment in &msg.attachments {
            let content_type = attachment.content_type.as_deref();
            let bytes = match attachment.download().await {
                Ok(bytes) => bytes,
                Err(error) => {
                    tracing::warn!(%error, filename = %attachment.filename, "attachment download failed");
                    continue;
                }
            };
            if attachments::is_image(content_type) {
                let mime = content_type.unwrap_or("image/png");
                image_parts.push(attachments::image_part(mime, &bytes));
            } else if let Some(extracted) =
                attachments::extract_text(&attachment.filename, content_type, &bytes)
            {
                prompt_text.push_str(&format!(
                    "\n\n[attached {}]\n{}",
                    attachment.filename, extracted
                ));
            }
        }

        let request = {
            let mut rng = rand::rng();
            self.deps
                .composer
                .build_request(channel_id, &prompt_text, &mut rng)
        };

        let typing = msg.channel_id.start_typing(&ctx.http);
        let mut parts = vec![ContentPart::Text(request.prompt)];
        parts.extend(image_parts);
        let reply = self
            .deps
            .llm
            .generate_or_fallback(&request.instruction, parts)
            .await;
        typing.stop();

        self.deps.memory.append(channel_id, BOT_NAME, &reply);
        self.deps.gate.note_response(channel_id);

        for chunk in split_message(&reply, MAX_MESSAGE_LENGTH) {
            msg.channel_id.say(&ctx.http, chunk).await?;
        }
        Ok(())
    }

    /// Assign a flag, attempt the external rename, and announce the label.
    async fn flag_user(
        &self,
        ctx: &Context,
        msg: &Message,
        kind: crate::moderation::TriggerKind,
    ) -> crate::Result<()> {
        let user_id = msg.author.id.to_string();
        let (flag, created) = {
            let mut rng = rand::rng();
            self.deps.moderation.assign(&user_id, &mut rng)
        };
        if !created {
            return Ok(());
        }
        tracing::info!(%user_id, label = %flag.label, ?kind, "user flagged");

        // Internal state is authoritative; the rename is advisory and will be
        // retried on the next observation if it fails here.
        if let Some(guild_id) = msg.guild_id
            && let Err(error) = self
                .apply_nickname(ctx, guild_id, msg.author.id, &flag.label)
                .await
        {
            tracing::warn!(%error, %user_id, "rename on assignment failed");
        }

        let announcement = format!(
            "{} has been designated **{}** until further notice. Conduct yourselves accordingly.",
            msg.author.mention(),
            flag.label
        );
        msg.channel_id.say(&ctx.http, announcement).await?;
        self.deps.gate.note_response(&msg.channel_id.to_string());
        Ok(())
    }

    async fn apply_nickname(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        user_id: UserId,
        nickname: &str,
    ) -> serenity::Result<()> {
        guild_id
            .edit_member(&ctx.http, user_id, EditMember::new().nickname(nickname))
            .await?;
        Ok(())
    }

    async fn dispatch_command(
        &self,
        ctx: &Context,
        msg: &Message,
        command: &str,
        rest: &str,
    ) -> crate::Result<()> {
        match command {
            "callsign" => self.cmd_callsign(ctx, msg, rest).await,
            "amnesty" => self.cmd_amnesty(ctx, msg).await,
            "manual" => self.cmd_manual(ctx, msg, rest).await,
            "mkchannel" => self.cmd_mkchannel(ctx, msg, rest).await,
            "help" => {
                msg.channel_id.say(&ctx.http, HELP_TEXT).await?;
                Ok(())
            }
            // Not one of ours; probably another bot's prefix.
            _ => Ok(()),
        }
    }

    /// `!callsign @user <name>`: operator only.
    async fn cmd_callsign(&self, ctx: &Context, msg: &Message, rest: &str) -> crate::Result<()> {
        if !self.is_operator(msg.author.id) {
            msg.channel_id
                .say(&ctx.http, "Callsigns are assigned by the operator alone.")
                .await?;
            return Ok(());
        }
        let Some(target) = msg.mentions.first() else {
            msg.channel_id
                .say(&ctx.http, "Usage: `!callsign @user <name>`")
                .await?;
            return Ok(());
        };
        let callsign = strip_mention_tokens(rest);
        if callsign.is_empty() {
            msg.channel_id
                .say(&ctx.http, "Usage: `!callsign @user <name>`")
                .await?;
            return Ok(());
        }

        self.deps.aliases.set(&target.id.to_string(), &callsign);
        msg.channel_id
            .say(
                &ctx.http,
                format!("Logged. {} answers to **{callsign}** now.", target.name),
            )
            .await?;
        Ok(())
    }

    /// `!amnesty @user`: operator only. Clears the flag and best-effort
    /// resets the nickname; a failed reset never blocks the amnesty.
    async fn cmd_amnesty(&self, ctx: &Context, msg: &Message) -> crate::Result<()> {
        if !self.is_operator(msg.author.id) {
            msg.channel_id
                .say(&ctx.http, "Amnesty is the operator's call, not yours.")
                .await?;
            return Ok(());
        }
        let Some(target) = msg.mentions.first() else {
            msg.channel_id
                .say(&ctx.http, "Usage: `!amnesty @user`")
                .await?;
            return Ok(());
        };

        match self.deps.moderation.clear(&target.id.to_string()) {
            Some(flag) => {
                let mut notice = format!(
                    "Amnesty granted. {} is no longer **{}**.",
                    target.name, flag.label
                );
                if let Some(guild_id) = msg.guild_id
                    && let Err(error) = self.apply_nickname(ctx, guild_id, target.id, "").await
                {
                    tracing::warn!(%error, user_id = %target.id, "nickname reset failed");
                    notice.push_str(" (Couldn't reset their nickname; check my permissions.)");
                }
                msg.channel_id.say(&ctx.http, notice).await?;
            }
            None => {
                msg.channel_id
                    .say(
                        &ctx.http,
                        format!("{} has no flag on record. Nothing to do.", target.name),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// `!manual <text>` (or an attached document): operator only. Replaces
    /// the reference document wholesale.
    async fn cmd_manual(&self, ctx: &Context, msg: &Message, rest: &str) -> crate::Result<()> {
        if !self.is_operator(msg.author.id) {
            msg.channel_id
                .say(&ctx.http, "The manual log is operator-maintained.")
                .await?;
            return Ok(());
        }

        let mut text = rest.trim().to_string();
        if text.is_empty()
            && let Some(attachment) = msg.attachments.first()
        {
            let bytes = attachment
                .download()
                .await
                .map_err(crate::Error::Discord)?;
            text = attachments::extract_text(
                &attachment.filename,
                attachment.content_type.as_deref(),
                &bytes,
            )
            .unwrap_or_default();
        }
        if text.is_empty() {
            msg.channel_id
                .say(&ctx.http, "Usage: `!manual <text>` or attach a readable document.")
                .await?;
            return Ok(());
        }

        self.deps.manual.set(&text)?;
        msg.channel_id
            .say(&ctx.http, "Manual log replaced. I'll study up.")
            .await?;
        Ok(())
    }

    /// `!mkchannel <name>`: create a text channel in the current guild.
    async fn cmd_mkchannel(&self, ctx: &Context, msg: &Message, rest: &str) -> crate::Result<()> {
        let name = rest.trim();
        if name.is_empty() {
            msg.channel_id
                .say(&ctx.http, "Usage: `!mkchannel <name>`")
                .await?;
            return Ok(());
        }
        let Some(guild_id) = msg.guild_id else {
            msg.channel_id
                .say(&ctx.http, "Channels can only be created inside a server.")
                .await?;
            return Ok(());
        };

        match guild_id
            .create_channel(
                &ctx.http,
                CreateChannel::new(name).kind(ChannelType::Text),
            )
            .await
        {
            Ok(channel) => {
                msg.channel_id
                    .say(&ctx.http, format!("Opened {}.", channel.name))
                    .await?;
            }
            Err(error) => {
                tracing::warn!(%error, name, "channel creation failed");
                msg.channel_id
                    .say(
                        &ctx.http,
                        "Couldn't create that channel; I may be missing permissions.",
                    )
                    .await?;
            }
        }
        Ok(())
    }
}

const HELP_TEXT: &str = "Commands: `!callsign @user <name>` (operator), `!amnesty @user` (operator), `!manual <text>` (operator), `!mkchannel <name>`, `!help`";

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        tracing::info!(user = %ready.user.name, "connected to discord");
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        // No per-message failure may take down the handler; everything is
        // caught here and logged.
        if let Err(error) = self.handle_message(&ctx, &msg).await {
            tracing::error!(%error, channel_id = %msg.channel_id, "message handling failed");
        }
    }

    /// Rename-notification path of the corrective self-loop: when a flagged
    /// user's nickname changes away from the label, change it right back.
    async fn guild_member_update(
        &self,
        ctx: Context,
        _old_if_available: Option<Member>,
        _new: Option<Member>,
        event: GuildMemberUpdateEvent,
    ) {
        let user_id = event.user.id.to_string();
        let Some(label) = self.deps.moderation.label_of(&user_id) else {
            return;
        };
        if event.nick.as_deref() == Some(label.as_str()) {
            return;
        }

        tracing::debug!(%user_id, %label, "re-applying label after external rename");
        if let Err(error) = self
            .apply_nickname(&ctx, event.guild_id, event.user.id, &label)
            .await
        {
            tracing::warn!(%error, %user_id, "corrective rename failed");
        }
    }
}

/// Split a command message into its name and argument tail.
/// Returns None for anything that isn't `!`-prefixed.
fn parse_command(text: &str) -> Option<(&str, &str)> {
    let stripped = text.strip_prefix('!')?;
    if stripped.is_empty() || stripped.starts_with(char::is_whitespace) {
        return None;
    }
    match stripped.split_once(char::is_whitespace) {
        Some((command, rest)) => Some((command, rest.trim())),
        None => Some((stripped, "")),
    }
}

/// Drop `<@…>` mention tokens from an argument tail, keeping the words.
fn strip_mention_tokens(rest: &str) -> String {
    rest.split_whitespace()
        .filter(|token| !(token.starts_with("<@") && token.ends_with('>')))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a reply into chunks that fit the platform's character limit.
/// Tries to split at newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let split_at = remaining[..max_len]
            .rfind('\n')
            .or_else(|| remaining[..max_len].rfind(' '))
            .unwrap_or(max_len);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::{parse_command, split_message, strip_mention_tokens};

    #[test]
    fn parse_command_splits_name_and_rest() {
        assert_eq!(parse_command("!help"), Some(("help", "")));
        assert_eq!(
            parse_command("!callsign <@123> Ghost"),
            Some(("callsign", "<@123> Ghost"))
        );
        assert_eq!(parse_command("hello there"), None);
        assert_eq!(parse_command("!"), None);
        assert_eq!(parse_command("! leading space"), None);
    }

    #[test]
    fn mention_tokens_are_stripped_from_args() {
        assert_eq!(strip_mention_tokens("<@123> Ghost"), "Ghost");
        assert_eq!(strip_mention_tokens("<@!123> Big Ghost"), "Big Ghost");
        assert_eq!(strip_mention_tokens("no mentions here"), "no mentions here");
        assert_eq!(strip_mention_tokens("<@123>"), "");
    }

    #[test]
    fn short_messages_pass_through_unsplit() {
        let chunks = split_message("short and sweet", 2000);
        assert_eq!(chunks, vec!["short and sweet".to_string()]);
    }

    #[test]
    fn long_messages_split_at_word_boundaries() {
        let text = "word ".repeat(100);
        let chunks = split_message(text.trim_end(), 48);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 48);
            assert!(!chunk.starts_with(' '));
        }
        let rejoined = chunks.join(" ");
        assert_eq!(rejoined, text.trim_end());
    }
}
