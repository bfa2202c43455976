//! Register command - enroll a card holder

use anyhow::Result;
use colored::Colorize;
use dialoguer::{Input, Password};
use gridpin_core::domain::{DuressPin, SelectionChange, PATTERN_LENGTH};
use gridpin_core::{AtmContext, Coordinate, Error, MaskedUser, OperationResult};

use super::{get_context, log_command};
use crate::output;

pub fn run(name: Option<String>, pattern: Vec<String>, duress_pin: Option<String>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    log_command(&ctx, "register");

    if json {
        // Non-interactive: everything must come from flags
        let (Some(name), Some(pin)) = (name, duress_pin) else {
            anyhow::bail!("--json requires --name, four --pattern cells and --duress-pin");
        };
        let result = ctx
            .enrollment
            .register_raw(&name, &pattern, &pin)
            .map(|user| user.masked());
        println!("{}", serde_json::to_string_pretty(&OperationResult::from(result))?);
        return Ok(());
    }

    let name = match name {
        Some(n) => n,
        None => Input::<String>::new().with_prompt("Name").interact_text()?,
    };

    let user = if pattern.is_empty() {
        enroll_interactively(&ctx, &name, duress_pin)?
    } else {
        let pin = match duress_pin {
            Some(p) => p,
            None => prompt_duress_pin()?,
        };
        ctx.enrollment.register_raw(&name, &pattern, &pin)?.masked()
    };

    output::success(&format!("Registered {}", user.name));
    println!("  ID: {}", user.id);
    println!("  Opening balance: {}", output::money(user.balance));
    println!();
    println!("Remember the order of your cells. Your PIN is read off a fresh grid at every login.");
    Ok(())
}

fn enroll_interactively(ctx: &AtmContext, name: &str, mut duress_pin: Option<String>) -> Result<MaskedUser> {
    let sessions = &ctx.sessions;
    let sid = sessions.open()?;
    sessions.begin_enrollment(sid, name)?;

    println!("{}", "Choose your secret pattern".bold());
    println!("Select {} cells in order. Selecting a chosen cell again removes it.", PATTERN_LENGTH);

    let mut selected: Vec<Coordinate> = Vec::new();
    let mut complete = false;
    loop {
        println!("{}", output::render_selection(&selected));
        let prompt = if complete {
            format!("Cell as row,col ({}/{}), or 'done'", selected.len(), PATTERN_LENGTH)
        } else {
            format!("Cell as row,col ({}/{})", selected.len(), PATTERN_LENGTH)
        };
        let entry: String = Input::new().with_prompt(prompt).interact_text()?;

        if entry.trim().eq_ignore_ascii_case("done") {
            if complete {
                break;
            }
            output::warning(&format!("Please select exactly {} cells.", PATTERN_LENGTH));
            continue;
        }

        let coord: Coordinate = match entry.parse() {
            Ok(c) => c,
            Err(e) => {
                output::error(&e.to_string());
                continue;
            }
        };

        let status = sessions.toggle_cell(sid, coord)?;
        match status.change {
            SelectionChange::Added(position) => output::info(&format!("{} is cell #{}", coord, position)),
            SelectionChange::Removed => output::info(&format!("{} removed", coord)),
            SelectionChange::Ignored => {
                output::warning("Pattern is full. Deselect a cell first.")
            }
        }
        selected = status.selected;
        complete = status.complete;
    }

    loop {
        let pin = match duress_pin.take() {
            Some(p) => p,
            None => prompt_duress_pin()?,
        };
        match sessions.complete_enrollment(sid, &pin) {
            Ok(user) => {
                let _ = sessions.logout(sid);
                return Ok(user);
            }
            Err(e @ (Error::WeakDuressPin | Error::Validation(_))) => output::error(&e.to_string()),
            Err(e) => {
                let _ = sessions.logout(sid);
                return Err(e.into());
            }
        }
    }
}

/// Ask until the PIN passes the format and weak-PIN checks
fn prompt_duress_pin() -> Result<String> {
    loop {
        let pin = Password::new()
            .with_prompt("Duress PIN (4 digits)")
            .interact()?;
        match DuressPin::parse(&pin) {
            Ok(_) => return Ok(pin),
            Err(e) => output::error(&e.to_string()),
        }
    }
}
