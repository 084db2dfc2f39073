pub mod auth;
pub mod dashboard;
pub mod quizzes;
pub mod uploads;
