use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::database::schema::music_history;

/// Whether the track started immediately or waited behind another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
    Queued,
    Played,
}

impl HistoryAction {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryAction::Queued => "queued",
            HistoryAction::Played => "played",
        }
    }
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug)]
#[diesel(table_name = music_history)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MusicHistory {
    pub id: i32,
    pub guild_id: String,
    pub user_id: String,
    pub title: String,
    pub url: String,
    pub action: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = music_history)]
pub struct NewMusicHistory {
    pub guild_id: String,
    pub user_id: String,
    pub title: String,
    pub url: String,
    pub action: String,
    pub created_at: NaiveDateTime,
}

impl MusicHistory {
    pub fn create(
        conn: &mut SqliteConnection,
        guild_id: &str,
        user_id: &str,
        title: &str,
        url: &str,
        action: HistoryAction,
        created_at: NaiveDateTime,
    ) -> QueryResult<usize> {
        let new_entry = NewMusicHistory {
            guild_id: guild_id.to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            url: url.to_string(),
            action: action.as_str().to_string(),
            created_at,
        };

        diesel::insert_into(music_history::table)
            .values(&new_entry)
            .execute(conn)
    }

    pub fn recent_for_guild(
        conn: &mut SqliteConnection,
        guild_id: &str,
        limit: i64,
    ) -> QueryResult<Vec<MusicHistory>> {
        music_history::table
            .filter(music_history::guild_id.eq(guild_id))
            .order((music_history::created_at.desc(), music_history::id.desc()))
            .limit(limit)
            .select(MusicHistory::as_select())
            .load::<MusicHistory>(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_connection;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn at(min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 1)
            .unwrap()
            .and_hms_opt(12, min, 0)
            .unwrap()
    }

    #[test]
    fn recent_is_newest_first_per_guild() {
        let mut conn = test_connection();
        for (min, title) in [(0, "first"), (1, "second"), (2, "third")] {
            MusicHistory::create(
                &mut conn,
                "g1",
                "u1",
                title,
                "https://cdn.example/x",
                HistoryAction::Played,
                at(min),
            )
            .unwrap();
        }
        MusicHistory::create(
            &mut conn,
            "g2",
            "u1",
            "other guild",
            "https://cdn.example/y",
            HistoryAction::Queued,
            at(3),
        )
        .unwrap();

        let rows = MusicHistory::recent_for_guild(&mut conn, "g1", 2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "third");
        assert_eq!(rows[1].title, "second");
        assert_eq!(rows[0].action, "played");
    }
}
