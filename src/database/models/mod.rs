pub mod attendance;
pub mod music_history;
pub mod reminder;
pub mod todo;

// Re-export all models for convenience
pub use attendance::Attendance;
pub use music_history::{HistoryAction, MusicHistory};
pub use reminder::Reminder;
pub use todo::Todo;
