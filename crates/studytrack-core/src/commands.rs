use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::calendar::group_by_calendar_day;
use crate::cli::{AddArgs, Command, EditArgs, ListArgs};
use crate::config::{Config, ViewMode};
use crate::datastore::DataStore;
use crate::datetime::local_now;
use crate::filter::project;
use crate::form::TaskFormData;
use crate::legacy::{self, LegacyTaskRow};
use crate::reminders::{due_within, lookahead_window};
use crate::render::Renderer;
use crate::store::TaskStore;
use crate::task::{Task, TaskId, UserId};

#[instrument(skip(store, datastore, cfg, renderer, command))]
pub async fn dispatch(
    store: &TaskStore,
    datastore: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::Login { user } => cmd_login(store, datastore, user).await,
        Command::Logout => cmd_logout(store, datastore).await,
        Command::Whoami => cmd_whoami(store),
        Command::Add(args) => cmd_add(store, args).await,
        Command::Edit(args) => cmd_edit(store, args).await,
        Command::Done { id } => cmd_done(store, &id).await,
        Command::Delete { id } => cmd_delete(store, &id).await,
        Command::List(args) => cmd_list(store, cfg, renderer, args),
        Command::Remind { hours } => cmd_remind(store, cfg, renderer, hours),
        Command::Import { file } => cmd_import(store, &file).await,
        Command::Export => cmd_export(store),
    }
}

async fn cmd_login(store: &TaskStore, datastore: &DataStore, raw: String) -> anyhow::Result<()> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("login: user id cannot be empty"));
    }
    let user = UserId::new(trimmed);
    info!(user = %user, "command login");

    datastore.set_active_user(Some(&user))?;
    store.session().login(user.clone());
    let count = store.handle_auth_change(Some(user.clone())).await?;
    println!("Signed in as {user} ({count} tasks)");
    Ok(())
}

async fn cmd_logout(store: &TaskStore, datastore: &DataStore) -> anyhow::Result<()> {
    info!("command logout");
    datastore.set_active_user(None)?;
    store.session().logout();
    store.handle_auth_change(None).await?;
    println!("Signed out");
    Ok(())
}

fn cmd_whoami(store: &TaskStore) -> anyhow::Result<()> {
    match store.session().current_user() {
        Some(user) => println!("{user}"),
        None => println!("Not signed in"),
    }
    Ok(())
}

async fn cmd_add(store: &TaskStore, args: AddArgs) -> anyhow::Result<()> {
    info!("command add");
    let form = TaskFormData {
        course_name: args.course,
        module_name: args.module,
        module_code: args.code,
        task_type: args.task_type,
        task_topic: args.topic,
        due_date: args.date,
        due_time: args.time,
    };
    let task = store.create(&form).await?;
    println!("Created task {}", task.id.short());
    Ok(())
}

async fn cmd_edit(store: &TaskStore, args: EditArgs) -> anyhow::Result<()> {
    info!(id = %args.id, "command edit");
    let tasks = signed_in_tasks(store)?;
    let id = resolve_id(&tasks, &args.id)?;
    let current = tasks
        .iter()
        .find(|task| task.id == id)
        .ok_or_else(|| anyhow!("no task with id {id}"))?;

    let mut form = TaskFormData::from_task(current);
    if let Some(course) = args.course {
        form.course_name = course;
    }
    if let Some(module) = args.module {
        form.module_name = module;
    }
    if let Some(code) = args.code {
        form.module_code = code;
    }
    if let Some(task_type) = args.task_type {
        form.task_type = task_type;
    }
    if let Some(topic) = args.topic {
        form.task_topic = topic;
    }
    if let Some(date) = args.date {
        form.due_date = date;
    }
    if let Some(time) = args.time {
        form.due_time = time;
    }

    let task = store.update(id, &form).await?;
    println!("Updated task {}", task.id.short());
    Ok(())
}

async fn cmd_done(store: &TaskStore, raw: &str) -> anyhow::Result<()> {
    info!(id = raw, "command done");
    let id = resolve_id(&signed_in_tasks(store)?, raw)?;
    let completed = store.toggle_complete(id).await?;
    debug!(%id, completed, "toggled");
    Ok(())
}

async fn cmd_delete(store: &TaskStore, raw: &str) -> anyhow::Result<()> {
    info!(id = raw, "command delete");
    let id = resolve_id(&signed_in_tasks(store)?, raw)?;
    store.delete(id).await?;
    Ok(())
}

fn cmd_list(
    store: &TaskStore,
    cfg: &Config,
    renderer: &Renderer,
    args: ListArgs,
) -> anyhow::Result<()> {
    let now = local_now();
    let mode = match args.filter {
        Some(mode) => mode,
        None => cfg.default_filter()?,
    };
    let key = match args.sort {
        Some(key) => key,
        None => cfg.default_sort()?,
    };
    let view = if args.calendar {
        ViewMode::Calendar
    } else if args.grid {
        ViewMode::Grid
    } else {
        cfg.default_view()?
    };
    info!(?mode, ?key, ?view, "command list");

    let tasks = project(&signed_in_tasks(store)?, mode, key, now);
    match view {
        ViewMode::Grid => renderer.print_task_grid(&tasks, now),
        ViewMode::Calendar => renderer.print_calendar(&group_by_calendar_day(&tasks), now),
    }
}

fn cmd_remind(
    store: &TaskStore,
    cfg: &Config,
    renderer: &Renderer,
    hours: Option<i64>,
) -> anyhow::Result<()> {
    let hours = match hours {
        Some(hours) => hours,
        None => cfg.reminder_lookahead_hours()?,
    };
    info!(hours, "command remind");
    let window = lookahead_window(hours).context("remind: invalid --hours")?;

    let now = local_now();
    let due = due_within(&signed_in_tasks(store)?, now, window)?;
    renderer.print_reminders(&due, now)
}

async fn cmd_import(store: &TaskStore, file: &Path) -> anyhow::Result<()> {
    info!(file = %file.display(), "command import");
    let owner = store
        .session()
        .current_user()
        .ok_or_else(|| anyhow!("import: not signed in"))?;

    let text = if file == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed reading stdin")?;
        buf
    } else {
        fs::read_to_string(file).with_context(|| format!("failed reading {}", file.display()))?
    };

    let rows = parse_legacy_rows(&text)?;
    let summary = import_rows(store, &owner, rows).await;
    println!("Imported {} tasks ({} skipped)", summary.added, summary.skipped);
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub skipped: usize,
}

/// Creates one task per row through the store. A row that cannot be
/// decoded, created or marked complete is counted as skipped and the
/// rest still go through.
pub async fn import_rows(
    store: &TaskStore,
    owner: &UserId,
    rows: Vec<LegacyTaskRow>,
) -> ImportSummary {
    let mut summary = ImportSummary::default();

    for row in rows {
        if row.user_id != owner.as_str() {
            warn!(row_user = %row.user_id, owner = %owner, "importing row from another user");
        }
        let decoded = match legacy::decode(&row) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "skipping undecodable row");
                summary.skipped += 1;
                continue;
            }
        };

        let task = match store.create(&decoded.form).await {
            Ok(task) => task,
            Err(err) => {
                warn!(error = %err, "skipping rejected row");
                summary.skipped += 1;
                continue;
            }
        };

        if decoded.completed
            && let Err(err) = store.toggle_complete(task.id).await
        {
            warn!(id = %task.id, error = %err, "imported row could not be marked complete");
            summary.skipped += 1;
            continue;
        }
        summary.added += 1;
    }

    summary
}

fn cmd_export(store: &TaskStore) -> anyhow::Result<()> {
    info!("command export");
    let owner = store
        .session()
        .current_user()
        .ok_or_else(|| anyhow!("export: not signed in"))?;

    let rows: Vec<LegacyTaskRow> = store
        .list()
        .iter()
        .map(|task| legacy::encode(task, &owner))
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

fn signed_in_tasks(store: &TaskStore) -> anyhow::Result<Vec<Task>> {
    if store.owner().is_none() {
        return Err(anyhow!(
            "not signed in; run `studytrack login <user>` first"
        ));
    }
    Ok(store.list())
}

/// A full uuid, or a prefix of one that matches exactly one task.
pub fn resolve_id(tasks: &[Task], raw: &str) -> anyhow::Result<TaskId> {
    if let Ok(id) = raw.parse::<TaskId>() {
        return Ok(id);
    }

    let needle = raw.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return Err(anyhow!("task id cannot be empty"));
    }

    let mut matches = tasks
        .iter()
        .filter(|task| task.id.to_string().starts_with(&needle));
    let first = matches
        .next()
        .ok_or_else(|| anyhow!("no task matches id {raw}"))?;
    if matches.next().is_some() {
        return Err(anyhow!("id prefix {raw} is ambiguous"));
    }
    Ok(first.id)
}

/// A JSON array of rows, or one row per line.
pub fn parse_legacy_rows(text: &str) -> anyhow::Result<Vec<LegacyTaskRow>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("import: empty input"));
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("failed parsing JSON array");
    }

    trimmed
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line.trim())
                .with_context(|| format!("failed parsing line {}", idx + 1))
        })
        .collect()
}
