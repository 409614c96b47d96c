use chrono::Utc;
use clap::Subcommand;
use coursesync_core::dates::parse_date;
use coursesync_core::storage::NewEvent;
use coursesync_core::{EventKind, EventRecord};

use super::Context;

#[derive(Subcommand)]
pub enum EventsAction {
    /// List calendar events
    List {
        /// Only assignments due from now on
        #[arg(long, conflicts_with = "custom")]
        upcoming: bool,
        /// Only events added by hand
        #[arg(long)]
        custom: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one event in full
    Show {
        /// Event ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every event (modules are kept)
    Clear,
    /// Add a custom event
    Add {
        /// Event title
        title: String,
        /// Due date, e.g. "2025-05-01T23:59" or "2025-05-01"
        #[arg(long)]
        due: String,
        /// assignment, quiz or test
        #[arg(long, default_value = "assignment")]
        kind: EventKind,
        /// Course the event belongs to
        #[arg(long)]
        course: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Delete a custom event
    Delete {
        /// Event ID
        id: i64,
    },
}

pub fn run(action: EventsAction, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let owner = ctx.owner()?;
    let store = ctx.store()?;

    match action {
        EventsAction::List {
            upcoming,
            custom,
            json,
        } => {
            let events = if upcoming {
                store.upcoming_assignments(&owner, Utc::now())?
            } else if custom {
                store.custom_events(&owner)?
            } else {
                store.events_for_owner(&owner)?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else if events.is_empty() {
                println!("No events.");
            } else {
                for event in &events {
                    print_event(event);
                }
            }
        }
        EventsAction::Show { id, json } => {
            let event = store
                .event(&owner, id)?
                .ok_or_else(|| format!("no event with id {id}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&event)?);
            } else {
                print_event_detail(&event);
            }
        }
        EventsAction::Clear => {
            let removed = store.clear_events(&owner)?;
            println!("removed {removed} events");
        }
        EventsAction::Add {
            title,
            due,
            kind,
            course,
            description,
        } => {
            let due_at = parse_date(&due).ok_or_else(|| format!("invalid due date: {due}"))?;
            let id = store.add_custom_event(
                &owner,
                &NewEvent {
                    title,
                    description,
                    due_at,
                    kind,
                    course_name: course,
                },
            )?;
            println!("Event created: {id}");
        }
        EventsAction::Delete { id } => {
            if store.delete_custom_event(&owner, id)? {
                println!("Event deleted: {id}");
            } else {
                return Err(format!("no custom event with id {id}").into());
            }
        }
    }
    Ok(())
}

fn print_event(event: &EventRecord) {
    let course = event.course_name.as_deref().unwrap_or("-");
    let marker = if event.custom { " (custom)" } else { "" };
    println!(
        "{:>5}  {}  {:<10}  {:<20}  {}{marker}",
        event.id,
        event.due_at.format("%Y-%m-%d %H:%M"),
        event.kind.as_str(),
        course,
        event.title
    );
}

fn print_event_detail(event: &EventRecord) {
    println!("{}", event.title);
    println!("  id:      {}", event.id);
    println!("  kind:    {}", event.kind);
    println!("  due:     {}", event.due_at.format("%Y-%m-%d %H:%M UTC"));
    println!("  course:  {}", event.course_name.as_deref().unwrap_or("-"));
    if event.custom {
        println!("  source:  custom");
    }
    if !event.description.is_empty() {
        println!();
        println!("{}", event.description);
    }
}
