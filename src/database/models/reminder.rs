use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::database::schema::reminders;

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug)]
#[diesel(table_name = reminders)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Reminder {
    pub id: i32,
    pub user_id: String,
    pub channel_id: String,
    pub message: String,
    pub send_time: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = reminders)]
pub struct NewReminder {
    pub user_id: String,
    pub channel_id: String,
    pub message: String,
    pub send_time: NaiveDateTime,
}

impl Reminder {
    pub fn create(
        conn: &mut SqliteConnection,
        user_id: &str,
        channel_id: &str,
        message: &str,
        send_time: NaiveDateTime,
    ) -> QueryResult<Reminder> {
        let new_reminder = NewReminder {
            user_id: user_id.to_string(),
            channel_id: channel_id.to_string(),
            message: message.to_string(),
            send_time,
        };

        diesel::insert_into(reminders::table)
            .values(&new_reminder)
            .returning(Reminder::as_returning())
            .get_result(conn)
    }

    /// Everything still on disk; rows are deleted only after delivery.
    pub fn all(conn: &mut SqliteConnection) -> QueryResult<Vec<Reminder>> {
        reminders::table
            .order(reminders::send_time.asc())
            .select(Reminder::as_select())
            .load::<Reminder>(conn)
    }

    pub fn find(conn: &mut SqliteConnection, id: i32) -> QueryResult<Option<Reminder>> {
        reminders::table
            .filter(reminders::id.eq(id))
            .select(Reminder::as_select())
            .first::<Reminder>(conn)
            .optional()
    }

    pub fn delete(conn: &mut SqliteConnection, id: i32) -> QueryResult<usize> {
        diesel::delete(reminders::table.filter(reminders::id.eq(id))).execute(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_connection;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn when(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn pending_scan_is_ordered_by_send_time() {
        let mut conn = test_connection();
        Reminder::create(&mut conn, "u1", "c1", "later", when(18)).unwrap();
        Reminder::create(&mut conn, "u1", "c1", "sooner", when(9)).unwrap();

        let all = Reminder::all(&mut conn).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].message, "sooner");
        assert_eq!(all[1].message, "later");
    }

    #[test]
    fn delete_after_delivery_leaves_nothing_to_refire() {
        let mut conn = test_connection();
        let r = Reminder::create(&mut conn, "u1", "c1", "ping", when(9)).unwrap();
        assert!(Reminder::find(&mut conn, r.id).unwrap().is_some());

        assert_eq!(Reminder::delete(&mut conn, r.id).unwrap(), 1);
        assert!(Reminder::find(&mut conn, r.id).unwrap().is_none());
        assert!(Reminder::all(&mut conn).unwrap().is_empty());
    }
}
