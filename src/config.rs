use anyhow::{anyhow, Result};
use std::env;

/// One bookable group: a name plus its fixed list of channel labels.
#[derive(Debug, Clone)]
pub struct GroupLayout {
    pub name: String,
    pub channels: Vec<String>,
}

/// A purchasable subscription pack.
#[derive(Debug, Clone, Copy)]
pub struct SubscriptionPack {
    pub count: i64,
    pub price: i64,
}

/// A pilot auto-booked into every new training.
#[derive(Debug, Clone)]
pub struct SeedPilot {
    pub user_id: i64,
    pub group: String,
    pub channel: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub database_url: String,
    pub http_port: u16,
    /// Allow-list of administrator Telegram ids
    pub admins: Vec<i64>,
    /// Club chat that receives booking/capacity announcements
    pub club_chat_id: i64,
    pub gateway_shop_id: Option<String>,
    pub gateway_secret_key: Option<String>,
    pub gateway_api_url: String,
    pub gateway_return_url: String,
    /// Shared secret for webhook signature verification; unsigned webhooks
    /// are accepted when unset
    pub webhook_secret: Option<String>,
    /// Capacity layout; total bookable units = sum of channel counts
    pub groups: Vec<GroupLayout>,
    /// Cancellations requested at least this many hours before the session
    /// refund one credit
    pub refund_window_hours: i64,
    /// Price of a single training slot, in whole currency units
    pub slot_price: i64,
    pub subscription_packs: Vec<SubscriptionPack>,
    /// Pilots pre-booked into every new training (club staff)
    pub seed_pilots: Vec<SeedPilot>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let token = env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| anyhow!("TELEGRAM_BOT_TOKEN must be set"))?;
        if token.trim().is_empty() {
            return Err(anyhow!("TELEGRAM_BOT_TOKEN must be set"));
        }

        let database_url = env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "sqlite:./data/club.db".to_string());

        let http_port = env::var("HTTP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid HTTP_PORT"))?;

        let admins = parse_id_list(&env::var("ADMINS").unwrap_or_default())?;
        if admins.is_empty() {
            return Err(anyhow!("ADMINS must list at least one Telegram id"));
        }

        let club_chat_id = env::var("CLUB_CHAT_ID")
            .map_err(|_| anyhow!("CLUB_CHAT_ID must be set"))?
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid CLUB_CHAT_ID"))?;

        let groups = parse_group_layout(
            &env::var("GROUP_LAYOUT").unwrap_or_else(|_| "fast:5,standard:7".to_string()),
        )?;

        let refund_window_hours = env::var("REFUND_WINDOW_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid REFUND_WINDOW_HOURS"))?;

        let slot_price = env::var("SLOT_PRICE")
            .unwrap_or_else(|_| "800".to_string())
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid SLOT_PRICE"))?;

        let subscription_packs = parse_subscription_packs(
            &env::var("SUBSCRIPTION_PACKS").unwrap_or_else(|_| "5:3800,10:7200".to_string()),
        )?;

        let seed_pilots = parse_seed_pilots(&env::var("SEED_PILOTS").unwrap_or_default())?;

        Ok(Config {
            telegram_bot_token: token,
            database_url,
            http_port,
            admins,
            club_chat_id,
            gateway_shop_id: env::var("GATEWAY_SHOP_ID").ok().filter(|v| !v.is_empty()),
            gateway_secret_key: env::var("GATEWAY_SECRET_KEY").ok().filter(|v| !v.is_empty()),
            gateway_api_url: env::var("GATEWAY_API_URL")
                .unwrap_or_else(|_| "https://api.yookassa.ru/v3/payments".to_string()),
            gateway_return_url: env::var("GATEWAY_RETURN_URL")
                .unwrap_or_else(|_| "https://whoopclub.example/payment/success".to_string()),
            webhook_secret: env::var("WEBHOOK_SECRET").ok().filter(|v| !v.is_empty()),
            groups,
            refund_window_hours,
            slot_price,
            subscription_packs,
            seed_pilots,
        })
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id)
    }

    pub fn group(&self, name: &str) -> Option<&GroupLayout> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Total bookable units across all groups.
    pub fn total_capacity(&self) -> i64 {
        self.groups.iter().map(|g| g.channels.len() as i64).sum()
    }

    pub fn pack(&self, count: i64) -> Option<SubscriptionPack> {
        self.subscription_packs.iter().copied().find(|p| p.count == count)
    }
}

fn parse_id_list(raw: &str) -> Result<Vec<i64>> {
    raw.split_whitespace()
        .map(|part| {
            part.parse()
                .map_err(|_| anyhow!("Invalid Telegram id in ADMINS: {part}"))
        })
        .collect()
}

/// Parses `fast:5,standard:7` into groups with channels `R1..Rn`.
fn parse_group_layout(raw: &str) -> Result<Vec<GroupLayout>> {
    let mut groups = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, count) = part
            .split_once(':')
            .ok_or_else(|| anyhow!("Invalid GROUP_LAYOUT entry: {part}"))?;
        let count: usize = count
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid channel count in GROUP_LAYOUT: {part}"))?;
        if count == 0 {
            return Err(anyhow!("Group {name} must have at least one channel"));
        }
        groups.push(GroupLayout {
            name: name.trim().to_string(),
            channels: (1..=count).map(|i| format!("R{i}")).collect(),
        });
    }
    if groups.is_empty() {
        return Err(anyhow!("GROUP_LAYOUT must declare at least one group"));
    }
    Ok(groups)
}

fn parse_subscription_packs(raw: &str) -> Result<Vec<SubscriptionPack>> {
    let mut packs = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (count, price) = part
            .split_once(':')
            .ok_or_else(|| anyhow!("Invalid SUBSCRIPTION_PACKS entry: {part}"))?;
        packs.push(SubscriptionPack {
            count: count
                .trim()
                .parse()
                .map_err(|_| anyhow!("Invalid pack size: {part}"))?,
            price: price
                .trim()
                .parse()
                .map_err(|_| anyhow!("Invalid pack price: {part}"))?,
        });
    }
    if packs.is_empty() {
        return Err(anyhow!("SUBSCRIPTION_PACKS must declare at least one pack"));
    }
    Ok(packs)
}

/// Parses `932407372:standard:R1,132536948:fast:R1`. Empty input is fine.
fn parse_seed_pilots(raw: &str) -> Result<Vec<SeedPilot>> {
    let mut pilots = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let mut fields = part.split(':');
        let (Some(user_id), Some(group), Some(channel), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(anyhow!("Invalid SEED_PILOTS entry: {part}"));
        };
        pilots.push(SeedPilot {
            user_id: user_id
                .trim()
                .parse()
                .map_err(|_| anyhow!("Invalid Telegram id in SEED_PILOTS: {part}"))?,
            group: group.trim().to_string(),
            channel: channel.trim().to_string(),
        });
    }
    Ok(pilots)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_layout_parsing() {
        let groups = parse_group_layout("fast:5,standard:7").unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "fast");
        assert_eq!(groups[0].channels, vec!["R1", "R2", "R3", "R4", "R5"]);
        assert_eq!(groups[1].channels.len(), 7);
    }

    #[test]
    fn group_layout_rejects_garbage() {
        assert!(parse_group_layout("").is_err());
        assert!(parse_group_layout("fast").is_err());
        assert!(parse_group_layout("fast:zero").is_err());
        assert!(parse_group_layout("fast:0").is_err());
    }

    #[test]
    fn subscription_pack_parsing() {
        let packs = parse_subscription_packs("5:3800,10:7200").unwrap();
        assert_eq!(packs.len(), 2);
        assert_eq!(packs[0].count, 5);
        assert_eq!(packs[1].price, 7200);
    }

    #[test]
    fn seed_pilot_parsing() {
        let pilots = parse_seed_pilots("1:standard:R1, 2:fast:R1").unwrap();
        assert_eq!(pilots.len(), 2);
        assert_eq!(pilots[0].group, "standard");
        assert_eq!(pilots[1].channel, "R1");
        assert!(parse_seed_pilots("").unwrap().is_empty());
        assert!(parse_seed_pilots("1:standard").is_err());
    }

    #[test]
    fn admin_list_parsing() {
        assert_eq!(parse_id_list("1 22 333").unwrap(), vec![1, 22, 333]);
        assert!(parse_id_list("1 abc").is_err());
        assert!(parse_id_list("").unwrap().is_empty());
    }
}
