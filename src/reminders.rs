use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use serenity::all::{ChannelId, Http};
use tracing::{info, warn};

use crate::clock;
use crate::database::{establish_connection, models::Reminder};
use crate::metrics::METRICS;

/// Arm a background task that fires the reminder at its send time.
/// Overdue reminders fire immediately.
pub fn schedule(http: Arc<Http>, reminder_id: i32, send_time: NaiveDateTime) {
    tokio::spawn(async move {
        let now = clock::now_naive();
        if send_time > now {
            let wait = (send_time - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;
        }
        fire(&http, reminder_id).await;
    });
}

/// Deliver, then delete. The row is removed only after the send attempt, so
/// a crash before delivery re-fires it on the next restart.
async fn fire(http: &Arc<Http>, reminder_id: i32) {
    let row = match establish_connection() {
        Ok(mut conn) => match Reminder::find(&mut conn, reminder_id) {
            Ok(row) => row,
            Err(e) => {
                warn!("reminder {reminder_id} lookup failed: {e}");
                return;
            }
        },
        Err(e) => {
            warn!("reminder {reminder_id} skipped, database unavailable: {e}");
            return;
        }
    };
    // Already delivered by an earlier instance, or deleted.
    let Some(reminder) = row else { return };

    match reminder.channel_id.parse::<u64>() {
        Ok(raw) if raw != 0 => {
            let content = format!("🔔 <@{}> Reminder: {}", reminder.user_id, reminder.message);
            if let Err(e) = ChannelId::new(raw).say(http, content).await {
                warn!("reminder {reminder_id} delivery failed: {e}");
            }
        }
        _ => warn!(
            "reminder {reminder_id} has unusable channel id {:?}",
            reminder.channel_id
        ),
    }

    match establish_connection() {
        Ok(mut conn) => {
            if let Err(e) = Reminder::delete(&mut conn, reminder_id) {
                warn!("reminder {reminder_id} cleanup failed: {e}");
            }
        }
        Err(e) => warn!("reminder {reminder_id} cleanup skipped: {e}"),
    }
    METRICS.inc_reminder_fired();
}

/// Re-arm everything on disk; called once on the first gateway ready.
pub fn restore_pending(http: Arc<Http>) {
    tokio::spawn(async move {
        let rows = match tokio::task::spawn_blocking(|| -> anyhow::Result<Vec<Reminder>> {
            let mut conn = establish_connection()?;
            Ok(Reminder::all(&mut conn)?)
        })
        .await
        {
            Ok(Ok(rows)) => rows,
            Ok(Err(e)) => {
                warn!("reminder restore failed: {e}");
                return;
            }
            Err(e) => {
                warn!("reminder restore task failed: {e}");
                return;
            }
        };

        let now = clock::now_naive();
        let (mut scheduled, mut overdue) = (0u32, 0u32);
        for reminder in rows {
            if reminder.send_time <= now {
                overdue += 1;
            } else {
                scheduled += 1;
            }
            schedule(http.clone(), reminder.id, reminder.send_time);
        }
        info!("reminders restored: {scheduled} scheduled, {overdue} firing late");
    });
}
