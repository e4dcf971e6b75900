//! Notification center CLI commands.

use std::sync::Arc;

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use bazaar_core::error::AppError;
use bazaar_core::types::id::{NotificationId, UserId};
use bazaar_entity::notification::Notification;
use bazaar_realtime::NotificationStore;
use bazaar_realtime::backend::RestNotificationBackend;

use crate::output::{self, OutputFormat};

/// Arguments for notification commands
#[derive(Debug, Args)]
pub struct NotificationArgs {
    /// User to act as (defaults to `session.user_id`)
    #[arg(short, long, global = true)]
    pub user: Option<Uuid>,

    /// Notification subcommand
    #[command(subcommand)]
    pub command: NotificationCommand,
}

/// Notification subcommands
#[derive(Debug, Subcommand)]
pub enum NotificationCommand {
    /// List notifications, newest first
    List {
        /// Only show unread notifications
        #[arg(long)]
        unread: bool,
    },
    /// Print the unread count
    Unread,
    /// Mark one notification as read
    Read {
        /// Notification ID
        id: Uuid,
    },
    /// Mark every notification as read
    ReadAll,
    /// Delete one notification
    Delete {
        /// Notification ID
        id: Uuid,
    },
    /// Delete every notification
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Follow the live feed and print alerts until Ctrl+C
    Watch,
}

/// Notification display row for table output
#[derive(Debug, Serialize, Tabled)]
struct NotificationRow {
    /// Notification ID
    id: String,
    /// Category
    #[tabled(rename = "type")]
    kind: String,
    /// Title
    title: String,
    /// Read or unread
    status: String,
    /// Created at
    created_at: String,
}

impl From<&Notification> for NotificationRow {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id.to_string(),
            kind: n.kind.label().to_string(),
            title: n.title.clone(),
            status: if n.is_read { "read" } else { "unread" }.to_string(),
            created_at: n.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// Execute notification commands
pub async fn execute(
    args: &NotificationArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let user = args
        .user
        .or(config.session.user_id)
        .map(UserId::from_uuid)
        .ok_or_else(|| {
            AppError::authentication("No user selected: pass --user or set session.user_id")
        })?;

    let backend = Arc::new(RestNotificationBackend::new(&config.backend)?);
    let store = NotificationStore::new(backend, config.notifications.clone());
    store.bind_user(Some(user));

    let result = run(&store, &args.command, format).await;
    store.shutdown();
    result
}

async fn run(
    store: &Arc<NotificationStore>,
    command: &NotificationCommand,
    format: OutputFormat,
) -> Result<(), AppError> {
    match command {
        NotificationCommand::List { unread } => {
            store.reconcile().await?;
            let rows: Vec<NotificationRow> = store
                .list()
                .iter()
                .filter(|n| !*unread || n.is_unread())
                .map(NotificationRow::from)
                .collect();
            output::print_list(&rows, format);
        }
        NotificationCommand::Unread => {
            store.reconcile().await?;
            let count = store.unread_count();
            match format {
                OutputFormat::Json => output::print_json(&serde_json::json!({ "unread": count })),
                OutputFormat::Table => println!("{count}"),
            }
        }
        NotificationCommand::Read { id } => {
            store.mark_read(NotificationId::from_uuid(*id)).await?;
            output::print_success(&format!("Notification {id} marked as read"));
        }
        NotificationCommand::ReadAll => {
            store.mark_all_read().await?;
            output::print_success("All notifications marked as read");
        }
        NotificationCommand::Delete { id } => {
            store.delete(NotificationId::from_uuid(*id)).await?;
            output::print_success(&format!("Notification {id} deleted"));
        }
        NotificationCommand::Clear { yes } => {
            if !*yes {
                let confirm = dialoguer::Confirm::new()
                    .with_prompt("Delete ALL notifications?")
                    .default(false)
                    .interact()
                    .map_err(|e| AppError::internal(format!("Input error: {e}")))?;

                if !confirm {
                    output::print_warning("Aborted.");
                    return Ok(());
                }
            }

            store.delete_all().await?;
            output::print_success("All notifications deleted");
        }
        NotificationCommand::Watch => watch(store, format).await?,
    }

    Ok(())
}

async fn watch(store: &Arc<NotificationStore>, format: OutputFormat) -> Result<(), AppError> {
    let mut alerts = store.alerts();
    let mut states = store.subscribe();
    let mut last_state = store.state();
    println!("Watching notifications ({last_state}), Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            alert = alerts.recv() => match alert {
                Ok(alert) => match format {
                    OutputFormat::Json => output::print_json(&alert),
                    OutputFormat::Table => println!(
                        "[{}] {}: {}{}",
                        alert.kind.label(),
                        alert.title,
                        alert.message,
                        alert.link.as_deref().map(|l| format!(" ({l})")).unwrap_or_default()
                    ),
                },
                Err(RecvError::Lagged(skipped)) => {
                    output::print_warning(&format!("Skipped {skipped} alerts"));
                }
                Err(RecvError::Closed) => break,
            },
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = states.borrow_and_update().clone();
                if snapshot.state != last_state {
                    output::print_kv("state", &snapshot.state.to_string());
                    output::print_kv("unread", &snapshot.unread_count.to_string());
                    last_state = snapshot.state;
                }
            }
        }
    }

    Ok(())
}
