use crate::storage::Identity;

const PORT: &str = "PORT";

pub fn get_port() -> Option<u16> {
    std::env::var(PORT).ok().and_then(|port| port.trim().parse().ok())
}

const DATABASE_URL: &str = "DATABASE_URL";

pub fn get_database_url() -> Option<String> {
    std::env::var(DATABASE_URL)
        .ok()
        .filter(|url| !url.trim().is_empty())
}

const BOT_TOKEN: &str = "BOT_TOKEN";

pub fn get_bot_token() -> Option<String> {
    std::env::var(BOT_TOKEN)
        .ok()
        .filter(|token| !token.trim().is_empty())
}

const ADMIN_IDS: &str = "ADMIN_IDS";

pub fn get_admin_ids() -> Vec<Identity> {
    std::env::var(ADMIN_IDS)
        .map(|ids| parse_admin_ids(&ids))
        .unwrap_or_default()
}

/// Parse a comma-separated identity list, skipping entries that are not numbers
pub fn parse_admin_ids(value: &str) -> Vec<Identity> {
    value
        .split(',')
        .filter_map(|id| id.parse::<Identity>().ok())
        .collect()
}
