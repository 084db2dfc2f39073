mod user;
pub use user::{UserEntity, UserEntityCreateUpdate};

mod credential;
pub use credential::Credential;

mod lesson;
pub use lesson::{Lesson, LessonCreate};

mod quiz_deck;
pub use quiz_deck::{QuizDeck, QuizDeckCreate};

mod quiz_card;
pub use quiz_card::{DeckAttachment, NewQuizCard, QuizCard, QuizCardWithChoices};

mod choice;
pub use choice::{Choice, NewChoice};

mod analytics;
pub use analytics::{Analytics, AttemptTotals, LessonAttemptsRow, LessonCompletionRow};
