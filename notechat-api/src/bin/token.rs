//! Mint a development token signed with `auth.secret_key`.
//!
//! Usage: `notechat-token <subject> [hours]`

use anyhow::{Context, Result, bail};
use std::env;

use notechat_api::core::{auth::AuthManager, config::Settings};

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let mut args = env::args().skip(1);
    let Some(subject) = args.next() else {
        bail!("usage: notechat-token <subject> [hours]");
    };

    let settings = Settings::new()?;
    let hours = match args.next() {
        Some(raw) => raw.parse().context("hours must be an integer")?,
        None => settings.auth.token_expiry_hours,
    };

    let auth = AuthManager::new(&settings.auth)?;
    println!("{}", auth.generate_token(&subject, hours)?);
    Ok(())
}
