//! Example 02: Persistence, Export and Import
//!
//! This example backs a store with files on disk, reopens it, and moves its
//! data and settings to a SQLite-backed store through a JSON export.
//!
//! Run with: cargo run --example 02_persistence

use eyre::Result;
use taskdeck::models::DAY_MS;
use taskdeck::{FileStorage, NewCollaborator, NewTask, SqliteStorage, Store, now_ms};

fn main() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let store_path = temp_dir.path().join("files");

    println!("taskdeck Persistence Example");
    println!("============================\n");
    println!("Store path: {}\n", store_path.display());

    // Every applied mutation saves a snapshot
    println!("1. SAVE - Writing to file storage...");
    let mut store = Store::open(FileStorage::open(&store_path)?);
    println!("   fresh store: {}", store.is_fresh());

    let id = store.add_task(NewTask::new("Group project", now_ms() + 3 * DAY_MS))?;
    let pat = store.add_collaborator(NewCollaborator {
        name: "Pat".to_string(),
        email: "pat@example.com".to_string(),
        avatar: None,
    });
    store.assign_collaborator(&id, &pat);
    store.update_settings(|settings| settings.set("privacy.hide_completed_tasks", "on"))?;
    println!("   shared tasks: {}\n", store.get_shared_tasks().len());

    // Reopen from the same directory
    println!("2. LOAD - Reopening...");
    let reopened = Store::open(FileStorage::open(&store_path)?);
    println!("   fresh store: {}", reopened.is_fresh());
    println!("   tasks: {}", reopened.tasks().len());
    println!(
        "   hide completed tasks: {}\n",
        reopened.settings().privacy.hide_completed_tasks
    );

    // Move everything to another backend
    println!("3. EXPORT / IMPORT - Copying to SQLite...");
    let exported = reopened.export_json()?;
    let mut sqlite = Store::open(SqliteStorage::open(temp_dir.path().join("taskdeck.db"))?);
    sqlite.import_json(&exported)?;
    println!("   tasks: {}", sqlite.tasks().len());
    println!("   collaborators: {}", sqlite.collaborators().len());
    println!(
        "   hide completed tasks: {}\n",
        sqlite.settings().privacy.hide_completed_tasks
    );

    println!("Example complete!");
    Ok(())
}
