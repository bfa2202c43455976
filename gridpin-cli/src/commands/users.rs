//! Users command - list registered card holders

use anyhow::Result;
use colored::Colorize;
use gridpin_core::ports::UserRepository;
use gridpin_core::MaskedUser;

use super::{get_context, log_command};
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    log_command(&ctx, "users");

    let users = ctx.repository.list_users()?;

    if json {
        let masked: Vec<MaskedUser> = users.iter().map(|u| u.masked()).collect();
        println!("{}", serde_json::to_string_pretty(&masked)?);
        return Ok(());
    }

    if users.is_empty() {
        println!("No card holders registered. Run {} to add one.", "gridpin register".bold());
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Name", "ID", "Transactions", "Registered"]);
    for user in &users {
        table.add_row(vec![
            user.name.clone(),
            user.id.to_string(),
            user.transaction_history.len().to_string(),
            user.created_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    println!("{}", table);
    Ok(())
}
