//! Example 01: Tasks, Categories and Tags
//!
//! This example builds an in-memory store, files a few tasks under the default
//! categories and tags, and runs the derived queries over them.
//!
//! Run with: cargo run --example 01_basic_store

use eyre::Result;
use taskdeck::models::DAY_MS;
use taskdeck::{NewTask, Priority, Store, TaskPatch, TaskStatus, now_ms};

fn main() -> Result<()> {
    println!("taskdeck Basic Store Example");
    println!("============================\n");

    let mut store = Store::new();
    store.seed_defaults();
    println!(
        "Seeded {} categories and {} tags.\n",
        store.categories().len(),
        store.tags().len()
    );

    let math = store.categories()[0].id.clone();
    let homework = store.tags()[0].id.clone();
    let now = now_ms();

    // Create a few tasks
    println!("1. CREATE - Adding tasks...");
    let worksheet = store.add_task(NewTask {
        priority: Priority::High,
        category_id: math.clone(),
        tags: vec![homework.clone()],
        ..NewTask::new("Algebra worksheet", now + 2 * DAY_MS)
    })?;
    let late = store.add_task(NewTask::new("Library books", now - DAY_MS))?;
    store.add_task(NewTask::new("Read chapter 4", now + 10 * DAY_MS))?;
    println!("   {} tasks in the store\n", store.tasks().len());

    // Update progress, then finish a task
    println!("2. UPDATE - Recording progress...");
    store.update_task(
        &worksheet,
        TaskPatch {
            progress: Some(60),
            status: Some(TaskStatus::InProgress),
            ..Default::default()
        },
    );
    store.update_task(&late, TaskPatch::complete());
    if let Some(task) = store.get_task_by_id(&worksheet) {
        println!("   {} is {} at {}%\n", task.title, task.status, task.progress);
    }

    // Derived queries
    println!("3. QUERY - Derived views...");
    println!("   in Math:          {}", store.get_tasks_by_category(&math).len());
    println!("   tagged Homework:  {}", store.get_tasks_by_tag(&homework).len());
    println!("   due within 7 days: {}", store.get_upcoming_tasks(7).len());
    println!("   overdue:          {}", store.get_overdue_tasks().len());

    let progress = store.get_task_progress();
    println!(
        "   completed:        {}/{} ({}%)\n",
        progress.completed,
        progress.total,
        progress.percent()
    );

    // Deleting a category clears it from its tasks
    println!("4. DELETE - Removing the Math category...");
    store.delete_category(&math);
    if let Some(task) = store.get_task_by_id(&worksheet) {
        println!("   {} now has category {:?}\n", task.title, task.category_id);
    }

    println!("Example complete!");
    Ok(())
}
