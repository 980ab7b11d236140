use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "dayglow", version, about = "Terminal calendar and mood diary client")]
pub struct Cli {
    /// Backend URL (overrides the configured one for this run)
    #[arg(long, global = true)]
    pub server: Option<String>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and store the session
    Login {
        username: String,
        /// Password (prompted on stdin when omitted)
        password: Option<String>,
    },
    /// End the session and discard the stored cookie
    Logout,
    /// Print a month overview
    Month {
        /// Year to show (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,
        /// Month to show, 1-12 (defaults to the current month)
        #[arg(long)]
        month: Option<u32>,
    },
    /// Print the twelve-month year overview
    Year {
        /// Year to show (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,
    },
    /// Print a day's events and subevents
    Day {
        /// Date in DD-MM-YYYY format
        date: String,
    },
    /// Create an event
    Add {
        /// Event name
        name: String,
        /// Start date in DD-MM-YYYY format
        #[arg(long)]
        start_date: String,
        /// Start time in HH:MM format (omit for an all-day event)
        #[arg(long)]
        start_time: Option<String>,
        /// End date in DD-MM-YYYY format (defaults to the start date)
        #[arg(long)]
        end_date: Option<String>,
        /// End time in HH:MM format
        #[arg(long)]
        end_time: Option<String>,
        /// Location
        #[arg(long = "where")]
        location: Option<String>,
        /// Company
        #[arg(long = "with")]
        with_who: Option<String>,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Edit an event (unspecified fields keep their current values)
    Edit {
        /// Event id
        event_id: i64,
        /// A day the event appears on, DD-MM-YYYY (used to fetch it)
        #[arg(long)]
        on: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New start date in DD-MM-YYYY format
        #[arg(long)]
        start_date: Option<String>,
        /// New start time in HH:MM format
        #[arg(long)]
        start_time: Option<String>,
        /// New end date in DD-MM-YYYY format
        #[arg(long)]
        end_date: Option<String>,
        /// New end time in HH:MM format
        #[arg(long)]
        end_time: Option<String>,
        /// New location
        #[arg(long = "where")]
        location: Option<String>,
        /// New company
        #[arg(long = "with")]
        with_who: Option<String>,
        /// New notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete an event
    Rm {
        /// Event id
        event_id: i64,
    },
    /// Set or clear a day's mood color
    Mood {
        /// Date in DD-MM-YYYY format
        date: String,
        /// A palette mood name, a "#rrggbb" color, or "clear"
        color: String,
    },
    /// Launch the interactive client
    Tui,
}
