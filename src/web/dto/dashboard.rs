use serde::{Deserialize, Serialize};

use crate::model::entity::{AttemptTotals, LessonAttemptsRow, LessonCompletionRow};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct QuizScore {
    pub attempts: i64,
    pub pass: i64,
}

impl From<AttemptTotals> for QuizScore {
    fn from(totals: AttemptTotals) -> Self {
        Self {
            attempts: totals.attempts,
            pass: totals.passed,
        }
    }
}

/// One bar of the quiz performance chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct QuizPerformance {
    pub bardisplay: String,
    pub tooltipdisplayquiz: String,
    pub attempts: i64,
    pub passed: i64,
}

impl From<LessonAttemptsRow> for QuizPerformance {
    fn from(row: LessonAttemptsRow) -> Self {
        Self {
            bardisplay: row.sequence.to_string(),
            tooltipdisplayquiz: row.title,
            attempts: row.attempts,
            passed: row.passed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LessonCompletion {
    pub lesson: String,
    pub users: i64,
    pub total_users: i64,
}

impl LessonCompletion {
    pub fn from_row(row: LessonCompletionRow, total_users: i64) -> Self {
        Self {
            lesson: format!("Lesson {}", row.sequence),
            users: row.completed_users,
            total_users,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DashboardResponse {
    pub total_users: i64,
    pub average_quiz_score: QuizScore,
    pub total_active_users: i64,
    pub quiz_performance: Vec<QuizPerformance>,
    pub lesson_completion: Vec<LessonCompletion>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chart_rows_test() {
        let bar = QuizPerformance::from(LessonAttemptsRow {
            sequence: 3,
            title: String::from("Fractions"),
            attempts: 10,
            passed: 7,
        });
        assert_eq!(bar.bardisplay, "3");
        assert_eq!(bar.tooltipdisplayquiz, "Fractions");

        let completion = LessonCompletion::from_row(
            LessonCompletionRow {
                sequence: 2,
                completed_users: 4,
            },
            12,
        );
        assert_eq!(completion.lesson, "Lesson 2");
        assert_eq!(completion.users, 4);
        assert_eq!(completion.total_users, 12);
    }
}
