use clap::Subcommand;
use coursesync_core::{EventRecord, ModuleItemRecord, ModuleRecord};
use serde::Serialize;

use super::Context;

#[derive(Subcommand)]
pub enum CoursesAction {
    /// List synced course names
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a course's assignments and modules
    Show {
        /// Course name as synced from the LMS
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct CourseView {
    name: String,
    assignments: Vec<EventRecord>,
    modules: Vec<ModuleView>,
}

#[derive(Serialize)]
struct ModuleView {
    #[serde(flatten)]
    module: ModuleRecord,
    items: Vec<ModuleItemRecord>,
}

pub fn run(action: CoursesAction, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let owner = ctx.owner()?;
    let store = ctx.store()?;

    match action {
        CoursesAction::List { json } => {
            let names = store.course_names(&owner)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&names)?);
            } else if names.is_empty() {
                println!("No courses. Run `coursesync sync` first.");
            } else {
                for name in names {
                    println!("{name}");
                }
            }
        }
        CoursesAction::Show { name, json } => {
            let assignments = store.course_assignments(&owner, &name)?;
            let modules = store
                .course_modules(&owner, &name)?
                .into_iter()
                .map(|module| {
                    let items = store.module_items(module.id)?;
                    Ok(ModuleView { module, items })
                })
                .collect::<Result<Vec<_>, coursesync_core::DatabaseError>>()?;

            if assignments.is_empty() && modules.is_empty() {
                return Err(format!("no synced data for course '{name}'").into());
            }

            let view = CourseView {
                name,
                assignments,
                modules,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_course(&view);
            }
        }
    }
    Ok(())
}

fn print_course(view: &CourseView) {
    println!("{}", view.name);
    println!("\nAssignments:");
    if view.assignments.is_empty() {
        println!("  (none)");
    }
    for a in &view.assignments {
        println!("  {}  {}", a.due_at.format("%Y-%m-%d %H:%M"), a.title);
    }
    println!("\nModules:");
    if view.modules.is_empty() {
        println!("  (none)");
    }
    for m in &view.modules {
        println!("  {}", m.module.title);
        for item in &m.items {
            if item.external_url.is_empty() {
                println!("    - {} [{}]", item.title, item.item_type);
            } else {
                println!("    - {} [{}] {}", item.title, item.item_type, item.external_url);
            }
        }
    }
}
