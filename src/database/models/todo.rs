use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::database::schema::todos;

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug)]
#[diesel(table_name = todos)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Todo {
    pub id: i32,
    pub user_id: String,
    pub task_date: NaiveDate,
    pub task: String,
    pub done: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = todos)]
pub struct NewTodo {
    pub user_id: String,
    pub task_date: NaiveDate,
    pub task: String,
    pub created_at: NaiveDateTime,
}

impl Todo {
    pub fn create(
        conn: &mut SqliteConnection,
        user_id: &str,
        task_date: NaiveDate,
        task: &str,
        created_at: NaiveDateTime,
    ) -> QueryResult<Todo> {
        let new_todo = NewTodo {
            user_id: user_id.to_string(),
            task_date,
            task: task.to_string(),
            created_at,
        };

        diesel::insert_into(todos::table)
            .values(&new_todo)
            .returning(Todo::as_returning())
            .get_result(conn)
    }

    pub fn for_date(
        conn: &mut SqliteConnection,
        user_id: &str,
        date: NaiveDate,
    ) -> QueryResult<Vec<Todo>> {
        todos::table
            .filter(todos::user_id.eq(user_id))
            .filter(todos::task_date.eq(date))
            .order(todos::id.asc())
            .select(Todo::as_select())
            .load::<Todo>(conn)
    }

    pub fn all_for_user(conn: &mut SqliteConnection, user_id: &str) -> QueryResult<Vec<Todo>> {
        todos::table
            .filter(todos::user_id.eq(user_id))
            .order((todos::task_date.asc(), todos::id.asc()))
            .select(Todo::as_select())
            .load::<Todo>(conn)
    }

    pub fn in_range(
        conn: &mut SqliteConnection,
        user_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> QueryResult<Vec<Todo>> {
        let mut query = todos::table
            .filter(todos::user_id.eq(user_id))
            .select(Todo::as_select())
            .into_boxed();
        if let Some(start) = start {
            query = query.filter(todos::task_date.ge(start));
        }
        if let Some(end) = end {
            query = query.filter(todos::task_date.le(end));
        }
        query
            .order((todos::task_date.asc(), todos::id.asc()))
            .load::<Todo>(conn)
    }

    pub fn mark_done(conn: &mut SqliteConnection, id: i32, user_id: &str) -> QueryResult<usize> {
        diesel::update(
            todos::table
                .filter(todos::id.eq(id))
                .filter(todos::user_id.eq(user_id)),
        )
        .set(todos::done.eq(true))
        .execute(conn)
    }

    pub fn delete(conn: &mut SqliteConnection, id: i32, user_id: &str) -> QueryResult<usize> {
        diesel::delete(
            todos::table
                .filter(todos::id.eq(id))
                .filter(todos::user_id.eq(user_id)),
        )
        .execute(conn)
    }

    pub fn clear_date(
        conn: &mut SqliteConnection,
        user_id: &str,
        date: NaiveDate,
    ) -> QueryResult<usize> {
        diesel::delete(
            todos::table
                .filter(todos::user_id.eq(user_id))
                .filter(todos::task_date.eq(date)),
        )
        .execute(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_connection;
    use pretty_assertions::assert_eq;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn stamp() -> NaiveDateTime {
        date("2025-01-15").and_hms_opt(9, 30, 0).unwrap()
    }

    #[test]
    fn create_and_list_by_date() {
        let mut conn = test_connection();
        let first = Todo::create(&mut conn, "u1", date("2025-01-15"), "write report", stamp()).unwrap();
        Todo::create(&mut conn, "u1", date("2025-01-15"), "review PR", stamp()).unwrap();
        Todo::create(&mut conn, "u1", date("2025-01-16"), "tomorrow thing", stamp()).unwrap();
        Todo::create(&mut conn, "u2", date("2025-01-15"), "someone else's", stamp()).unwrap();

        let rows = Todo::for_date(&mut conn, "u1", date("2025-01-15")).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, first.id);
        assert_eq!(rows[0].task, "write report");
        assert!(!rows[0].done);
    }

    #[test]
    fn done_and_delete_are_scoped_to_the_owner() {
        let mut conn = test_connection();
        let todo = Todo::create(&mut conn, "u1", date("2025-01-15"), "mine", stamp()).unwrap();

        assert_eq!(Todo::mark_done(&mut conn, todo.id, "u2").unwrap(), 0);
        assert_eq!(Todo::mark_done(&mut conn, todo.id, "u1").unwrap(), 1);
        let rows = Todo::for_date(&mut conn, "u1", date("2025-01-15")).unwrap();
        assert!(rows[0].done);

        assert_eq!(Todo::delete(&mut conn, todo.id, "u2").unwrap(), 0);
        assert_eq!(Todo::delete(&mut conn, todo.id, "u1").unwrap(), 1);
        assert!(Todo::for_date(&mut conn, "u1", date("2025-01-15")).unwrap().is_empty());
    }

    #[test]
    fn clear_removes_only_that_date() {
        let mut conn = test_connection();
        Todo::create(&mut conn, "u1", date("2025-01-15"), "a", stamp()).unwrap();
        Todo::create(&mut conn, "u1", date("2025-01-15"), "b", stamp()).unwrap();
        Todo::create(&mut conn, "u1", date("2025-01-16"), "c", stamp()).unwrap();

        assert_eq!(Todo::clear_date(&mut conn, "u1", date("2025-01-15")).unwrap(), 2);
        let all = Todo::all_for_user(&mut conn, "u1").unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].task, "c");
    }

    #[test]
    fn range_filters_are_inclusive() {
        let mut conn = test_connection();
        for (d, name) in [
            ("2025-01-10", "early"),
            ("2025-01-15", "middle"),
            ("2025-01-20", "late"),
        ] {
            Todo::create(&mut conn, "u1", date(d), name, stamp()).unwrap();
        }

        let all = Todo::in_range(&mut conn, "u1", None, None).unwrap();
        assert_eq!(all.len(), 3);

        let from = Todo::in_range(&mut conn, "u1", Some(date("2025-01-15")), None).unwrap();
        assert_eq!(from.len(), 2);
        assert_eq!(from[0].task, "middle");

        let window = Todo::in_range(
            &mut conn,
            "u1",
            Some(date("2025-01-10")),
            Some(date("2025-01-15")),
        )
        .unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[1].task, "middle");
    }
}
