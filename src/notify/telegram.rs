//! Telegram delivery
//!
//! Thin wrapper over the bot API: one chat, HTML parse mode, no keyboards.
//! Message formatting lives here so the planning logic stays free of
//! presentation concerns.

use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};

use super::{AlertKind, PlannedAlert};

/// Telegram notifier for sending messages
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNotifier {
    /// Create a new Telegram notifier
    ///
    /// # Arguments
    /// * `bot_token` - Telegram bot token from @BotFather
    /// * `chat_id` - Chat ID to send notifications to
    pub fn new(bot_token: &str, chat_id: &str) -> Result<Self, String> {
        if bot_token.is_empty() {
            return Err("Bot token is empty".to_string());
        }
        if chat_id.is_empty() {
            return Err("Chat ID is empty".to_string());
        }

        let chat_id_parsed: i64 = chat_id
            .parse()
            .map_err(|e| format!("Invalid chat ID '{}': {}", chat_id, e))?;

        Ok(Self {
            bot: Bot::new(bot_token),
            chat_id: ChatId(chat_id_parsed),
        })
    }

    /// Send a plain text message
    pub async fn send_message(&self, message: &str) -> Result<(), String> {
        self.bot
            .send_message(self.chat_id, message)
            .parse_mode(ParseMode::Html)
            .send()
            .await
            .map_err(|e| format!("Failed to send Telegram message: {}", e))?;

        Ok(())
    }
}

/// Render one planned alert as an HTML message
pub fn format_alert(alert: &PlannedAlert) -> String {
    let candidate = &alert.candidate;
    let metrics = &candidate.metrics;

    let header = match &alert.kind {
        AlertKind::New => format!(
            "{} <b>{}</b>",
            alert.tier.emoji(),
            alert.tier.as_str().to_uppercase()
        ),
        AlertKind::Upgrade { from } => format!(
            "{} <b>UPGRADE: {} → {}</b>",
            alert.tier.emoji(),
            from.as_str().to_uppercase(),
            alert.tier.as_str().to_uppercase()
        ),
    };

    format!(
        "{header}\n\n\
         <b>${symbol}</b> — {name}\n\n\
         📊 Score: {score:.0}/100\n\
         💧 Liquidity: ${liq:.1}k\n\
         📈 Volume 1h: ${vol:.1}k\n\
         ⏱ Age: {age:.0} minutes\n\n\
         <code>{address}</code>",
        header = header,
        symbol = candidate.token.symbol,
        name = candidate.token.name,
        score = candidate.scores.composite,
        liq = metrics.liquidity_usd / 1000.0,
        vol = metrics.volume_1h_usd / 1000.0,
        age = candidate.age_minutes,
        address = candidate.token.address,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{Candidate, TokenIdentity};
    use crate::notify::NotifyTier;

    #[test]
    fn test_empty_credentials_rejected() {
        assert!(TelegramNotifier::new("", "123").is_err());
        assert!(TelegramNotifier::new("token", "").is_err());
        assert!(TelegramNotifier::new("token", "not-a-number").is_err());
    }

    #[test]
    fn test_upgrade_header_names_both_tiers() {
        let alert = PlannedAlert {
            kind: AlertKind::Upgrade {
                from: NotifyTier::Watch,
            },
            tier: NotifyTier::Good,
            candidate: Candidate {
                token: TokenIdentity {
                    address: "0xtok".to_string(),
                    symbol: "EXM".to_string(),
                    name: "Example".to_string(),
                },
                ..Candidate::default()
            },
        };

        let message = format_alert(&alert);
        assert!(message.contains("WATCH → GOOD"));
        assert!(message.contains("<code>0xtok</code>"));
    }
}
