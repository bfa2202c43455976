//! Login command - authenticate at the ATM and run transactions
//!
//! Nothing printed here may tell real and duress sessions apart.

use std::io::BufRead;

use anyhow::Result;
use colored::Colorize;
use dialoguer::{Input, Password, Select};
use gridpin_core::domain::TransactionKind;
use gridpin_core::services::{AccountView, Receipt, SessionController, SessionId, SessionPhase};
use gridpin_core::{AtmContext, Error, Grid, PinVerdict};

use super::{get_context, get_data_dir, log_command};
use crate::output;

const MENU: [&str; 7] = [
    "Balance",
    "Withdraw",
    "Deposit",
    "Statement",
    "Financial insights",
    "Read balance aloud",
    "Exit",
];

pub fn run(name: &str) -> Result<()> {
    let ctx = get_context()?;
    log_command(&ctx, "login");

    let sid = ctx.sessions.open()?;
    let result = run_session(&ctx, sid, name);
    let _ = ctx.sessions.logout(sid);
    result
}

fn run_session(ctx: &AtmContext, sid: SessionId, name: &str) -> Result<()> {
    let sessions = &ctx.sessions;
    let challenge = sessions.login(sid, name)?;

    println!("Welcome, {}", challenge.name.bold());
    println!("Read the digits under your pattern cells, in order.");
    show_grid(&challenge.grid, challenge.dynamic_pin.as_deref());

    loop {
        let entered = read_pin()?;
        match sessions.authenticate(sid, &entered) {
            Ok(auth) if auth.verdict == PinVerdict::Invalid => {
                output::error("Invalid PIN. A new grid has been issued.");
                if let Some(grid) = auth.retry_grid {
                    show_grid(&grid, auth.retry_pin.as_deref());
                }
            }
            Ok(_) => break,
            Err(e @ Error::Validation(_)) => {
                if sessions.phase(sid)? == SessionPhase::Anonymous {
                    anyhow::bail!("{}. Please start again.", e);
                }
                output::error(&e.to_string());
            }
            Err(e) => return Err(e.into()),
        }
    }

    output::success("Authenticated.");
    menu(ctx, sid)
}

fn show_grid(grid: &Grid, demo_pin: Option<&str>) {
    println!("{}", output::render_grid(grid));
    if let Some(pin) = demo_pin {
        println!("{}", format!("Demo mode: your PIN for this grid is {}", pin).yellow());
    }
}

/// Masked prompt on a terminal, plain line when piped
fn read_pin() -> Result<String> {
    if atty::is(atty::Stream::Stdin) {
        Ok(Password::new().with_prompt("Enter PIN").interact()?)
    } else {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        if line.is_empty() {
            anyhow::bail!("No PIN entered");
        }
        Ok(line.trim().to_string())
    }
}

fn menu(ctx: &AtmContext, sid: SessionId) -> Result<()> {
    let sessions = &ctx.sessions;

    loop {
        println!();
        let choice = Select::new()
            .with_prompt("Choose a service")
            .items(&MENU)
            .default(0)
            .interact()?;

        let outcome = match choice {
            0 => sessions
                .balance(sid)
                .map(|b| println!("Available balance: {}", output::money(b).bold())),
            1 => transact(sessions, sid, "Withdrawal amount", SessionController::withdraw),
            2 => transact(sessions, sid, "Deposit amount", SessionController::deposit),
            3 => sessions.account_view(sid).map(|view| print_statement(&view)),
            4 => {
                insights(ctx, sid)?;
                Ok(())
            }
            5 => {
                read_aloud(ctx, sid)?;
                Ok(())
            }
            _ => {
                println!("Thank you. Please take your card.");
                return Ok(());
            }
        };

        if let Err(e) = outcome {
            output::error(&e.to_string());
        }
    }
}

fn transact(
    sessions: &SessionController,
    sid: SessionId,
    prompt: &str,
    op: fn(&SessionController, SessionId, i64) -> gridpin_core::domain::result::Result<Receipt>,
) -> gridpin_core::domain::result::Result<()> {
    let amount = match Input::<i64>::new().with_prompt(prompt).interact_text() {
        Ok(a) => a,
        Err(e) => return Err(Error::validation(e.to_string())),
    };
    let receipt = op(sessions, sid, amount)?;
    print_receipt(&receipt);
    Ok(())
}

fn print_receipt(receipt: &Receipt) {
    let action = match receipt.kind {
        TransactionKind::Debit => "Withdrew",
        TransactionKind::Credit => "Deposited",
    };
    output::success(&format!("{} {}", action, output::money(receipt.amount)));
    println!("  Balance: {}", output::money(receipt.balance));
    println!("  {}", receipt.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string().dimmed());
}

fn print_statement(view: &AccountView) {
    println!("{}", format!("Statement for {}", view.name).bold());
    if view.history.is_empty() {
        println!("No transactions yet.");
    } else {
        let mut table = output::create_table();
        table.set_header(vec!["Date", "Description", "Amount"]);
        for line in &view.history {
            let amount = match line.kind {
                TransactionKind::Debit => format!("-{}", output::money(line.amount)).red().to_string(),
                TransactionKind::Credit => format!("+{}", output::money(line.amount)).green().to_string(),
            };
            table.add_row(vec![
                line.timestamp.format("%Y-%m-%d %H:%M").to_string(),
                line.description.clone(),
                amount,
            ]);
        }
        println!("{}", table);
    }
    println!("Balance: {}", output::money(view.balance).bold());
}

fn insights(ctx: &AtmContext, sid: SessionId) -> Result<()> {
    let view = ctx.sessions.account_view(sid)?;
    let choice = Select::new()
        .with_prompt("Insights")
        .items(&["Analyze my spending", "Plan a savings goal", "Back"])
        .default(0)
        .interact()?;

    let advice = match choice {
        0 => {
            let pb = output::spinner("Analyzing your spending...");
            let advice = ctx.advisor.analyze_spending(&view);
            pb.finish_and_clear();
            advice
        }
        1 => {
            let goal: String = Input::new().with_prompt("Goal").allow_empty(true).interact_text()?;
            let amount: i64 = Input::new().with_prompt("Target amount").interact_text()?;
            let pb = output::spinner("Building your savings plan...");
            let advice = ctx.advisor.savings_plan(&view, &goal, amount);
            pb.finish_and_clear();
            advice
        }
        _ => return Ok(()),
    };

    match advice {
        Ok(text) => {
            println!();
            println!("{}", text);
        }
        Err(e) => output::error(&e.to_string()),
    }
    Ok(())
}

fn read_aloud(ctx: &AtmContext, sid: SessionId) -> Result<()> {
    let balance = ctx.sessions.balance(sid)?;
    let text = format!("Your available balance is {} rupees.", balance);

    let pb = output::spinner("Generating speech...");
    let wav = ctx.speech.speak_wav(&text);
    pb.finish_and_clear();

    match wav {
        Ok(bytes) => {
            let path = get_data_dir().join("balance.wav");
            std::fs::write(&path, &bytes)?;
            output::info(&format!("Saved audio to {}", path.display()));
        }
        Err(e) => output::error(&e.to_string()),
    }
    Ok(())
}
