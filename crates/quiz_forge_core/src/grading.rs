//! crates/quiz_forge_core/src/grading.rs
//!
//! Scores submitted answers against a quiz's canonical question set.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::domain::{GradeResult, Question, QuestionKind, UserAnswer};

/// Grades `answers` against `questions`.
///
/// `total_questions` is always the size of the canonical set. Answers whose
/// question id is unknown are ignored, and only the first answer given for a
/// question is scored.
pub fn grade(questions: &[Question], answers: &[UserAnswer]) -> GradeResult {
    let by_id: HashMap<&str, &Question> = questions.iter().map(|q| (q.id.as_str(), q)).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut correct_answers = 0;

    for answer in answers {
        let Some(question) = by_id.get(answer.question_id.as_str()) else {
            debug!(question_id = %answer.question_id, "Ignoring answer for unknown question");
            continue;
        };
        if !seen.insert(question.id.as_str()) {
            continue;
        }
        if is_correct(question, &answer.submitted_answer) {
            correct_answers += 1;
        }
    }

    GradeResult {
        correct_answers,
        total_questions: questions.len(),
    }
}

/// Applies the per-kind scoring rule to one answer.
pub fn is_correct(question: &Question, submitted: &str) -> bool {
    match question.kind {
        QuestionKind::MultipleChoice | QuestionKind::TrueFalse => question
            .correct_option()
            .is_some_and(|option| option.text == submitted),
        QuestionKind::ShortAnswer => question
            .answer_key
            .as_deref()
            .is_some_and(|key| short_answer_matches(key, submitted)),
    }
}

/// Short answers match after trimming surrounding whitespace, ignoring case.
/// Inner whitespace, punctuation and diacritics are compared as-is.
pub fn short_answer_matches(answer_key: &str, submitted: &str) -> bool {
    answer_key.trim().to_lowercase() == submitted.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AnswerOption;

    fn multiple_choice(id: &str, correct: &str) -> Question {
        let options = ["Red", "Green", "Blue", "Yellow"]
            .iter()
            .map(|t| AnswerOption {
                text: t.to_string(),
                correct: *t == correct,
            })
            .collect();
        Question {
            id: id.to_string(),
            text: "Pick a colour".to_string(),
            kind: QuestionKind::MultipleChoice,
            options,
            answer_key: None,
        }
    }

    fn true_false(id: &str, correct: bool) -> Question {
        Question {
            id: id.to_string(),
            text: "Statement".to_string(),
            kind: QuestionKind::TrueFalse,
            options: vec![
                AnswerOption {
                    text: "True".to_string(),
                    correct,
                },
                AnswerOption {
                    text: "False".to_string(),
                    correct: !correct,
                },
            ],
            answer_key: None,
        }
    }

    fn short_answer(id: &str, key: &str) -> Question {
        Question {
            id: id.to_string(),
            text: "Capital?".to_string(),
            kind: QuestionKind::ShortAnswer,
            options: Vec::new(),
            answer_key: Some(key.to_string()),
        }
    }

    fn answer(id: &str, text: &str) -> UserAnswer {
        UserAnswer {
            question_id: id.to_string(),
            submitted_answer: text.to_string(),
        }
    }

    #[test]
    fn test_multiple_choice_requires_exact_option_text() {
        let q = multiple_choice("q1", "Blue");
        assert!(is_correct(&q, "Blue"));
        assert!(!is_correct(&q, "blue"));
        assert!(!is_correct(&q, "Red"));
    }

    #[test]
    fn test_true_false_scoring() {
        let q = true_false("q1", false);
        assert!(!is_correct(&q, "True"));
        assert!(is_correct(&q, "False"));
    }

    #[test]
    fn test_short_answer_is_case_insensitive() {
        let q = short_answer("q1", "Paris");
        assert!(is_correct(&q, "paris"));
        assert!(is_correct(&q, "PARIS"));
    }

    #[test]
    fn test_short_answer_trims_surrounding_whitespace_only() {
        let q = short_answer("q1", "Paris");
        assert!(is_correct(&q, "Paris "));
        assert!(is_correct(&q, "  paris\n"));
        assert!(!is_correct(&q, "Pa ris"));
        assert!(!is_correct(&q, "Paris."));
    }

    #[test]
    fn test_short_answer_does_not_fold_diacritics() {
        let q = short_answer("q1", "Zürich");
        assert!(is_correct(&q, "zürich"));
        assert!(!is_correct(&q, "Zurich"));
    }

    #[test]
    fn test_total_is_canonical_count() {
        let questions = vec![multiple_choice("a", "Red"), true_false("b", true), short_answer("c", "x")];
        let result = grade(&questions, &[answer("a", "Red")]);
        assert_eq!(
            result,
            GradeResult {
                correct_answers: 1,
                total_questions: 3
            }
        );
    }

    #[test]
    fn test_empty_answers_score_zero_of_total() {
        let questions = vec![multiple_choice("a", "Red"), true_false("b", true)];
        let result = grade(&questions, &[]);
        assert_eq!(result.correct_answers, 0);
        assert_eq!(result.total_questions, 2);
    }

    #[test]
    fn test_empty_question_set_scores_zero_of_zero() {
        let result = grade(&[], &[answer("a", "Red")]);
        assert_eq!(
            result,
            GradeResult {
                correct_answers: 0,
                total_questions: 0
            }
        );
    }

    #[test]
    fn test_unknown_question_ids_are_ignored() {
        let questions = vec![multiple_choice("a", "Red")];
        let result = grade(&questions, &[answer("zzz", "Red"), answer("a", "Red")]);
        assert_eq!(result.correct_answers, 1);
        assert_eq!(result.total_questions, 1);
    }

    #[test]
    fn test_only_first_answer_per_question_counts() {
        let questions = vec![multiple_choice("a", "Red"), true_false("b", true)];
        let answers = [answer("a", "Red"), answer("a", "Red"), answer("a", "Red")];
        assert_eq!(grade(&questions, &answers).correct_answers, 1);

        let answers = [answer("a", "Green"), answer("a", "Red")];
        assert_eq!(grade(&questions, &answers).correct_answers, 0);
    }

    #[test]
    fn test_question_without_correct_option_never_scores() {
        let mut q = multiple_choice("a", "none");
        q.options.iter_mut().for_each(|o| o.correct = false);
        assert!(!is_correct(&q, "Red"));
    }

    #[test]
    fn test_grading_is_deterministic() {
        let questions = vec![multiple_choice("a", "Red"), short_answer("b", "Lima")];
        let answers = [answer("a", "Red"), answer("b", "lima")];
        assert_eq!(grade(&questions, &answers), grade(&questions, &answers));
    }
}
