use crate::model::Question;
use crate::quiz::AnswerTracker;

/// Outcome of scoring a set of answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Score {
    pub correct_count: usize,
    pub score_percent: u8,
    pub per_question_correctness: Vec<bool>,
}

/// Score `answers` against `questions`.
///
/// Unanswered questions count as incorrect. The percentage is rounded to the
/// nearest integer with halves rounded up.
#[must_use]
pub fn score(questions: &[Question], answers: &AnswerTracker) -> Score {
    let per_question_correctness: Vec<bool> = questions
        .iter()
        .enumerate()
        .map(|(index, question)| {
            answers
                .get(index)
                .is_some_and(|selected| question.is_correct(selected))
        })
        .collect();
    let correct_count = per_question_correctness.iter().filter(|c| **c).count();

    Score {
        correct_count,
        score_percent: rounded_percent(correct_count, questions.len()),
        per_question_correctness,
    }
}

fn rounded_percent(correct: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = (200 * correct + total) / (2 * total);
    u8::try_from(percent.min(100)).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::QuestionBank;
    use crate::quiz::test_support::quiz_with_answers;

    fn answer_all(tracker: &mut AnswerTracker, picks: &[usize]) {
        for (i, pick) in picks.iter().enumerate() {
            tracker.set_answer(i, *pick).unwrap();
        }
    }

    #[test]
    fn four_of_five_is_eighty() {
        let bank = QuestionBank::load(&quiz_with_answers(&[0, 1, 2, 3, 0])).unwrap();
        let mut tracker = AnswerTracker::new(bank.len());
        answer_all(&mut tracker, &[0, 1, 2, 3, 1]);

        let score = score(bank.questions(), &tracker);
        assert_eq!(score.correct_count, 4);
        assert_eq!(score.score_percent, 80);
        assert_eq!(
            score.per_question_correctness,
            vec![true, true, true, true, false]
        );
    }

    #[test]
    fn unanswered_count_as_wrong() {
        let bank = QuestionBank::load(&quiz_with_answers(&[0, 0, 0])).unwrap();
        let tracker = AnswerTracker::new(bank.len());
        let score = score(bank.questions(), &tracker);
        assert_eq!(score.correct_count, 0);
        assert_eq!(score.score_percent, 0);
        assert_eq!(score.per_question_correctness, vec![false; 3]);
    }

    #[test]
    fn rounds_halves_up() {
        assert_eq!(rounded_percent(1, 8), 13);
        assert_eq!(rounded_percent(1, 3), 33);
        assert_eq!(rounded_percent(2, 3), 67);
        assert_eq!(rounded_percent(3, 3), 100);
    }

    #[test]
    fn bounded_and_idempotent() {
        let keys = [3, 1, 0, 2, 2, 1, 0];
        let bank = QuestionBank::load(&quiz_with_answers(&keys)).unwrap();
        for answered in 0..=keys.len() {
            let mut tracker = AnswerTracker::new(bank.len());
            for i in 0..answered {
                tracker.set_answer(i, (i * 3) % 4).unwrap();
            }
            let first = score(bank.questions(), &tracker);
            let second = score(bank.questions(), &tracker);
            assert_eq!(first, second);
            assert!(first.correct_count <= keys.len());
            assert!(first.score_percent <= 100);
        }
    }
}
