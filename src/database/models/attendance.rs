use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::database::schema::attendance;

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug)]
#[diesel(table_name = attendance)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Attendance {
    pub id: i32,
    pub user_id: String,
    pub username: String,
    pub guild_id: String,
    pub checkin_time: NaiveDateTime,
    pub checkout_time: Option<NaiveDateTime>,
    pub work_duration_secs: Option<i32>,
}

#[derive(Insertable)]
#[diesel(table_name = attendance)]
pub struct NewAttendance {
    pub user_id: String,
    pub username: String,
    pub guild_id: String,
    pub checkin_time: NaiveDateTime,
}

impl Attendance {
    pub fn check_in(
        conn: &mut SqliteConnection,
        user_id: &str,
        username: &str,
        guild_id: &str,
        at: NaiveDateTime,
    ) -> QueryResult<Attendance> {
        let new_record = NewAttendance {
            user_id: user_id.to_string(),
            username: username.to_string(),
            guild_id: guild_id.to_string(),
            checkin_time: at,
        };

        diesel::insert_into(attendance::table)
            .values(&new_record)
            .returning(Attendance::as_returning())
            .get_result(conn)
    }

    /// Latest check-in inside the half-open [start, end) window, typically
    /// one calendar day.
    pub fn latest_for_window(
        conn: &mut SqliteConnection,
        user_id: &str,
        guild_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> QueryResult<Option<Attendance>> {
        attendance::table
            .filter(attendance::user_id.eq(user_id))
            .filter(attendance::guild_id.eq(guild_id))
            .filter(attendance::checkin_time.ge(start))
            .filter(attendance::checkin_time.lt(end))
            .order(attendance::checkin_time.desc())
            .select(Attendance::as_select())
            .first::<Attendance>(conn)
            .optional()
    }

    pub fn complete(
        conn: &mut SqliteConnection,
        id: i32,
        checkout_at: NaiveDateTime,
        duration_secs: i32,
    ) -> QueryResult<usize> {
        diesel::update(attendance::table.filter(attendance::id.eq(id)))
            .set((
                attendance::checkout_time.eq(checkout_at),
                attendance::work_duration_secs.eq(duration_secs),
            ))
            .execute(conn)
    }

    pub fn recent_for_user(
        conn: &mut SqliteConnection,
        user_id: &str,
        limit: i64,
    ) -> QueryResult<Vec<Attendance>> {
        attendance::table
            .filter(attendance::user_id.eq(user_id))
            .order(attendance::checkin_time.desc())
            .limit(limit)
            .select(Attendance::as_select())
            .load::<Attendance>(conn)
    }

    pub fn in_range(
        conn: &mut SqliteConnection,
        user_id: &str,
        guild_id: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> QueryResult<Vec<Attendance>> {
        let mut query = attendance::table
            .filter(attendance::user_id.eq(user_id))
            .filter(attendance::guild_id.eq(guild_id))
            .select(Attendance::as_select())
            .into_boxed();
        if let Some(start) = start {
            query = query.filter(attendance::checkin_time.ge(start));
        }
        if let Some(end) = end {
            query = query.filter(attendance::checkin_time.lt(end));
        }
        query
            .order(attendance::checkin_time.desc())
            .load::<Attendance>(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_connection;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn at(day: u32, hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 2, day)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    #[test]
    fn checkout_finds_todays_open_record() {
        let mut conn = test_connection();
        Attendance::check_in(&mut conn, "u1", "alice", "g1", at(9, 8, 55)).unwrap();
        let today = Attendance::check_in(&mut conn, "u1", "alice", "g1", at(10, 9, 5)).unwrap();

        let found = Attendance::latest_for_window(&mut conn, "u1", "g1", at(10, 0, 0), at(11, 0, 0))
            .unwrap()
            .unwrap();
        assert_eq!(found.id, today.id);
        assert_eq!(found.checkout_time, None);

        // Other guilds and users stay invisible.
        assert!(
            Attendance::latest_for_window(&mut conn, "u1", "g2", at(10, 0, 0), at(11, 0, 0))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn complete_stores_checkout_and_duration() {
        let mut conn = test_connection();
        let rec = Attendance::check_in(&mut conn, "u1", "alice", "g1", at(10, 9, 0)).unwrap();
        let checkout = at(10, 17, 30);
        let secs = (checkout - rec.checkin_time).num_seconds() as i32;
        assert_eq!(secs, 8 * 3600 + 30 * 60);

        assert_eq!(Attendance::complete(&mut conn, rec.id, checkout, secs).unwrap(), 1);
        let updated = Attendance::recent_for_user(&mut conn, "u1", 1).unwrap().remove(0);
        assert_eq!(updated.checkout_time, Some(checkout));
        assert_eq!(updated.work_duration_secs, Some(secs));
    }

    #[test]
    fn recent_is_newest_first_and_limited() {
        let mut conn = test_connection();
        for day in 1..=7 {
            Attendance::check_in(&mut conn, "u1", "alice", "g1", at(day, 9, 0)).unwrap();
        }
        let recent = Attendance::recent_for_user(&mut conn, "u1", 5).unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].checkin_time, at(7, 9, 0));
        assert_eq!(recent[4].checkin_time, at(3, 9, 0));
    }

    #[test]
    fn range_export_is_newest_first() {
        let mut conn = test_connection();
        for day in [5, 10, 15] {
            Attendance::check_in(&mut conn, "u1", "alice", "g1", at(day, 9, 0)).unwrap();
        }
        let rows =
            Attendance::in_range(&mut conn, "u1", "g1", Some(at(6, 0, 0)), None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].checkin_time, at(15, 9, 0));
    }
}
