mod api;
mod cli;
mod commands;
mod config;
mod model;
mod ui;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let server = args.server;
    let command = args.command.unwrap_or(cli::Command::Tui);
    match command {
        cli::Command::Login { username, password } => commands::login(server, username, password),
        cli::Command::Logout => commands::logout(server),
        cli::Command::Month { year, month } => commands::month(server, year, month),
        cli::Command::Year { year } => commands::year(server, year),
        cli::Command::Day { date } => commands::day(server, date),
        cli::Command::Add {
            name,
            start_date,
            start_time,
            end_date,
            end_time,
            location,
            with_who,
            notes,
        } => commands::add(
            server, name, start_date, start_time, end_date, end_time, location, with_who, notes,
        ),
        cli::Command::Edit {
            event_id,
            on,
            name,
            start_date,
            start_time,
            end_date,
            end_time,
            location,
            with_who,
            notes,
        } => commands::edit(
            server, event_id, on, name, start_date, start_time, end_date, end_time, location,
            with_who, notes,
        ),
        cli::Command::Rm { event_id } => commands::rm(server, event_id),
        cli::Command::Mood { date, color } => commands::mood(server, date, color),
        cli::Command::Tui => commands::tui(server),
    }
}
