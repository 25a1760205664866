//! Daily per-guild loops for announcements and reminders.

mod daily_loop;
mod time_of_day;

pub use daily_loop::{DailyLoop, DailyTask};
pub use time_of_day::TimeOfDay;
