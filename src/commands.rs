use crate::api::Client;
use crate::config;
use crate::model::{
    format_form_date, parse_color, parse_form_date, parse_form_time, Event, EventPayload,
    MonthGrid, ViewState, MOODS,
};
use crate::ui;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{Datelike, Local};
use std::collections::HashMap;
use std::io::{self, Write};

fn build_client(server: Option<String>) -> Result<Client> {
    let config_path = config::config_path()?;
    let config = config::load_config(&config_path)?;
    let session = config::load_session(&config::session_path()?)?;
    let url = server.unwrap_or(config.server_url);
    let client = Client::new(url, session.map(|s| s.cookie))?;
    Ok(client)
}

pub fn login(server: Option<String>, username: String, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => {
            print!("Password: ");
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    let mut client = build_client(server)?;
    client.login(&username, &password)?;
    if let Some(cookie) = client.cookie() {
        let session = config::Session {
            cookie: cookie.to_string(),
        };
        config::save_session(&config::session_path()?, &session)
            .context("storing session")?;
    }
    println!("Logged in as {}", username);
    Ok(())
}

pub fn logout(server: Option<String>) -> Result<()> {
    let mut client = build_client(server)?;
    if let Err(err) = client.logout() {
        println!("Warning: server logout failed: {}", err);
    }
    config::clear_session(&config::session_path()?)?;
    println!("Logged out");
    Ok(())
}

pub fn month(server: Option<String>, year: Option<i32>, month: Option<u32>) -> Result<()> {
    let today = Local::now().date_naive();
    let state = ViewState {
        year: year.unwrap_or_else(|| today.year()),
        month: month.unwrap_or_else(|| today.month()),
    };
    if state.month < 1 || state.month > 12 {
        bail!("month must be between 1 and 12");
    }
    let client = build_client(server)?;
    let data = client.get_month(state.year, state.month)?;
    print_month_grid(
        &data.month_label,
        &data.calendar_data,
        &data.days_with_events,
        &data.mood_colors,
        &data.days_with_marker,
    );
    println!("  * event   ~ mood   . marker");
    Ok(())
}

pub fn year(server: Option<String>, year: Option<i32>) -> Result<()> {
    let today = Local::now().date_naive();
    let year = year.unwrap_or_else(|| today.year());
    let client = build_client(server)?;
    let data = client.get_year(year)?;
    println!("{}", data.year);
    for month in &data.months {
        let label = ViewState {
            year: data.year,
            month: month.month,
        };
        println!(
            "  {:<12} {:>2} days with events, {:>2} mood entries",
            label
                .date(1)
                .map(|d| d.format("%B").to_string())
                .unwrap_or_else(|| format!("month {}", month.month)),
            month.days_with_events.len(),
            month.mood_colors.len(),
        );
    }
    Ok(())
}

pub fn day(server: Option<String>, date: String) -> Result<()> {
    let parsed = parse_form_date(&date)
        .ok_or_else(|| anyhow!("invalid date (use DD-MM-YYYY): {}", date))?;
    let client = build_client(server)?;
    let events = client.day_events(parsed.year(), parsed.month(), parsed.day())?;
    println!("{}", parsed.format("%-d %B %Y"));
    if events.is_empty() {
        println!("  No events scheduled");
        return Ok(());
    }
    for event in &events {
        print_event(event);
    }
    Ok(())
}

pub fn add(
    server: Option<String>,
    name: String,
    start_date: String,
    start_time: Option<String>,
    end_date: Option<String>,
    end_time: Option<String>,
    location: Option<String>,
    with_who: Option<String>,
    notes: Option<String>,
) -> Result<()> {
    let start_date = checked_date(&start_date)?;
    let end_date = match end_date {
        Some(raw) => checked_date(&raw)?,
        None => start_date.clone(),
    };
    let payload = EventPayload {
        name,
        start_date,
        start_time: start_time.as_deref().map(checked_time).transpose()?,
        end_date,
        end_time: end_time.as_deref().map(checked_time).transpose()?,
        location,
        with_who,
        notes,
    };
    let client = build_client(server)?;
    client.create_event(&payload)?;
    println!("Created event \"{}\" on {}", payload.name, payload.start_date);
    Ok(())
}

pub fn edit(
    server: Option<String>,
    event_id: i64,
    on: String,
    name: Option<String>,
    start_date: Option<String>,
    start_time: Option<String>,
    end_date: Option<String>,
    end_time: Option<String>,
    location: Option<String>,
    with_who: Option<String>,
    notes: Option<String>,
) -> Result<()> {
    let on_date =
        parse_form_date(&on).ok_or_else(|| anyhow!("invalid date (use DD-MM-YYYY): {}", on))?;
    let client = build_client(server)?;
    let events = client.day_events(on_date.year(), on_date.month(), on_date.day())?;
    let current = events
        .into_iter()
        .find(|event| event.id == event_id)
        .ok_or_else(|| anyhow!("event {} not found on {}", event_id, on))?;

    let payload = EventPayload {
        name: name.unwrap_or_else(|| current.name.clone()),
        start_date: match start_date {
            Some(raw) => checked_date(&raw)?,
            None => format_form_date(current.start_time.date()),
        },
        start_time: match start_time {
            Some(raw) => Some(checked_time(&raw)?),
            None => Some(current.start_time.format("%H:%M").to_string()),
        },
        end_date: match end_date {
            Some(raw) => checked_date(&raw)?,
            None => format_form_date(current.end_day()),
        },
        end_time: match end_time {
            Some(raw) => Some(checked_time(&raw)?),
            None => current.end_time.map(|e| e.format("%H:%M").to_string()),
        },
        location: location.or(current.location),
        with_who: with_who.or(current.with_who),
        notes: notes.or(current.notes),
    };
    client.update_event(event_id, &payload)?;
    println!("Updated event {}", event_id);
    Ok(())
}

pub fn rm(server: Option<String>, event_id: i64) -> Result<()> {
    let client = build_client(server)?;
    client.delete_event(event_id)?;
    println!("Deleted event {}", event_id);
    Ok(())
}

pub fn mood(server: Option<String>, date: String, color: String) -> Result<()> {
    let parsed = parse_form_date(&date)
        .ok_or_else(|| anyhow!("invalid date (use DD-MM-YYYY): {}", date))?;
    let resolved = resolve_color(&color)?;
    let client = build_client(server)?;
    client.set_mood(
        parsed.year(),
        parsed.month(),
        parsed.day(),
        resolved.as_deref(),
    )?;
    match resolved {
        Some(color) => println!("Mood for {} set to {}", date, color),
        None => println!("Mood for {} cleared", date),
    }
    Ok(())
}

pub fn tui(server: Option<String>) -> Result<()> {
    let client = build_client(server)?;
    ui::run(client)
}

fn checked_date(raw: &str) -> Result<String> {
    parse_form_date(raw)
        .map(|_| raw.trim().to_string())
        .ok_or_else(|| anyhow!("invalid date (use DD-MM-YYYY): {}", raw))
}

fn checked_time(raw: &str) -> Result<String> {
    parse_form_time(raw)
        .map(|_| raw.trim().to_string())
        .ok_or_else(|| anyhow!("invalid time (use HH:MM): {}", raw))
}

fn resolve_color(raw: &str) -> Result<Option<String>> {
    if raw.eq_ignore_ascii_case("clear") {
        return Ok(None);
    }
    if let Some(mood) = MOODS.iter().find(|m| m.name.eq_ignore_ascii_case(raw)) {
        return Ok(Some(mood.color.to_string()));
    }
    if parse_color(raw).is_some() {
        return Ok(Some(raw.to_string()));
    }
    bail!(
        "unknown color {:?} (use a mood name, #rrggbb, or \"clear\")",
        raw
    )
}

fn print_month_grid(
    label: &str,
    grid: &MonthGrid,
    days_with_events: &[u32],
    mood_colors: &HashMap<u32, String>,
    days_with_marker: &[u32],
) {
    println!("{}", label);
    println!("    Mon    Tue    Wed    Thu    Fri    Sat    Sun");
    let mut cells: Vec<Option<u32>> = Vec::with_capacity(42);
    cells.extend(grid.prev_days.iter().map(|_| None));
    cells.extend(grid.current_days.iter().map(|d| Some(*d)));
    cells.extend(grid.next_days.iter().map(|_| None));

    for week in cells.chunks(7) {
        let mut line = String::new();
        for cell in week {
            match cell {
                None => line.push_str("       "),
                Some(day) => {
                    let event = if days_with_events.contains(day) { '*' } else { ' ' };
                    let mood = if mood_colors.contains_key(day) { '~' } else { ' ' };
                    let marker = if days_with_marker.contains(day) { '.' } else { ' ' };
                    line.push_str(&format!("  {:>2}{}{}{}", day, event, mood, marker));
                }
            }
        }
        println!("{}", line.trim_end());
    }
}

fn print_event(event: &Event) {
    println!("  - [{}] {} ({})", event.id, event.name, event.display_time());
    if let Some(with_who) = &event.with_who {
        println!("      with: {}", with_who);
    }
    if let Some(location) = &event.location {
        println!("      where: {}", location);
    }
    if let Some(notes) = &event.notes {
        println!("      notes: {}", notes);
    }
    for sub in &event.subevents {
        println!("      * [{}] {} ({})", sub.id, sub.name, sub.display_time());
        if let Some(location) = &sub.location {
            println!("          where: {}", location);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_color_accepts_palette_names_hex_and_clear() {
        assert_eq!(resolve_color("clear").unwrap(), None);
        assert_eq!(
            resolve_color("radiant").unwrap().as_deref(),
            Some("#f9c74f")
        );
        assert_eq!(
            resolve_color("#112233").unwrap().as_deref(),
            Some("#112233")
        );
        assert!(resolve_color("sparkly").is_err());
    }

    #[test]
    fn checked_date_and_time_keep_the_raw_string() {
        assert_eq!(checked_date("05-03-2025").unwrap(), "05-03-2025");
        assert!(checked_date("2025-03-05").is_err());
        assert_eq!(checked_time("07:30").unwrap(), "07:30");
        assert!(checked_time("7am").is_err());
    }
}
