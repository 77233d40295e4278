//! Interactive terminal quiz.

use std::error::Error;

use services::{AppServices, ReportOutcome};
use showfarm_core::QuizError;
use showfarm_core::model::{LearnerId, LessonRef, QuizDefinition};
use showfarm_core::quiz::{QuizResult, QuizSession, SessionState};
use tokio::io::{AsyncBufReadExt, BufReader};

enum Event {
    Line(Option<String>),
    Report(Option<ReportOutcome>),
}

enum Input {
    Continue,
    Submitted,
    Quit,
}

/// Run `quiz` for `learner` until they quit, retaking on request.
pub async fn run_quiz(
    app: &AppServices,
    learner: LearnerId,
    lesson: LessonRef,
    quiz: &QuizDefinition,
) -> Result<(), Box<dyn Error>> {
    let mut handle = app.quiz().open(learner, lesson, quiz)?;
    handle.session().set_on_tick(|remaining| {
        if remaining > 0 && (remaining % 60 == 0 || remaining <= 10) {
            println!("  ({remaining}s left)");
        }
    });
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!(
        "{}: {} questions, {}s, pass mark {}%.",
        quiz.title(),
        quiz.questions().len(),
        quiz.time_limit_seconds(),
        quiz.pass_threshold_percent(),
    );
    print_help();

    loop {
        handle.session().start()?;
        print_current(handle.session());

        let outcome = loop {
            let event = tokio::select! {
                line = lines.next_line() => Event::Line(line?),
                report = handle.next_report() => Event::Report(report),
            };
            match event {
                Event::Report(outcome) => {
                    println!("Time is up, your answers were submitted.");
                    break outcome;
                }
                Event::Line(None) => {
                    handle.session().abandon();
                    return Ok(());
                }
                Event::Line(Some(line)) => match apply_input(handle.session(), line.trim()) {
                    Input::Continue => {}
                    Input::Submitted => break handle.next_report().await,
                    Input::Quit => {
                        handle.session().abandon();
                        println!("Quiz abandoned.");
                        return Ok(());
                    }
                },
            }
        };

        if let Some(result) = handle.session().result() {
            print_result(&result, quiz.pass_threshold_percent());
        }
        if let Some(outcome) = outcome {
            print_outcome(&outcome);
        }

        println!("Type r to retake, anything else to quit.");
        match lines.next_line().await? {
            Some(line) if line.trim().eq_ignore_ascii_case("r") => handle.session().retake()?,
            _ => return Ok(()),
        }
    }
}

fn apply_input(session: &QuizSession, input: &str) -> Input {
    let outcome = match input {
        "s" => match session.submit() {
            Ok(_) => return Input::Submitted,
            Err(err) => Err(err),
        },
        "q" => return Input::Quit,
        "n" => session.next().map(drop),
        "p" => session.previous().map(drop),
        "?" | "h" => {
            print_help();
            return Input::Continue;
        }
        other => {
            if let Some(target) = other.strip_prefix("g ") {
                match target.trim().parse::<usize>() {
                    Ok(number) => session.navigate(number.saturating_sub(1)).map(drop),
                    Err(_) => {
                        println!("Usage: g <question number>");
                        return Input::Continue;
                    }
                }
            } else if let Ok(choice @ 1..=4) = other.parse::<usize>() {
                select_and_advance(session, choice - 1)
            } else {
                println!("Unrecognised input, type ? for help.");
                return Input::Continue;
            }
        }
    };

    match outcome {
        Ok(()) => print_current(session),
        Err(err) => {
            if let Some(message) = learner_message(&err) {
                println!("{message}");
            }
        }
    }
    Input::Continue
}

/// Text to show the learner for `err`; other errors only reach the log.
fn learner_message(err: &QuizError) -> Option<String> {
    if err.is_user_facing() {
        Some(err.to_string())
    } else {
        tracing::warn!(%err, "quiz input rejected");
        None
    }
}

fn select_and_advance(
    session: &QuizSession,
    option_index: usize,
) -> Result<(), QuizError> {
    let Some(progress) = session.progress() else {
        return session.select_answer(0, option_index);
    };
    session.select_answer(progress.current_question_index, option_index)?;
    if progress.current_question_index + 1 < progress.total {
        session.next()?;
    }
    Ok(())
}

fn print_help() {
    println!("  1-4 answer   n next   p previous   g <k> go to question   s submit   q quit");
}

fn print_current(session: &QuizSession) {
    let SessionState::InProgress {
        answers,
        current_question_index,
        ..
    } = session.state()
    else {
        return;
    };
    let Some(question) = session.bank().get(current_question_index) else {
        return;
    };

    println!();
    println!(
        "Question {}/{} ({} answered, {}s left)",
        current_question_index + 1,
        session.bank().len(),
        answers.completed_count(),
        session.remaining_seconds().unwrap_or(0),
    );
    println!("{}", question.text());
    let selected = answers.get(current_question_index);
    for (i, option) in question.options().iter().enumerate() {
        let marker = if selected == Some(i) { '*' } else { ' ' };
        println!(" {marker}{}. {option}", i + 1);
    }
}

fn print_result(result: &QuizResult, pass_threshold_percent: u8) {
    println!();
    println!(
        "Score: {}% ({}/{} correct) in {}s. Pass mark {}%: {}.",
        result.score_percent,
        result.correct_count,
        result.total_questions,
        result.time_taken_seconds,
        pass_threshold_percent,
        if result.passed { "passed" } else { "not passed" },
    );
    for (i, correct) in result.per_question_correctness.iter().enumerate() {
        let answer = result
            .answers
            .get(&i)
            .map_or_else(|| "-".to_string(), |a| (a + 1).to_string());
        println!("  Q{}: {} (answered {answer})", i + 1, if *correct { "correct" } else { "wrong" });
    }
}

fn print_outcome(outcome: &ReportOutcome) {
    if outcome.persisted {
        println!("Attempt saved.");
    }
    if outcome.lesson_completed {
        println!("Lesson marked complete.");
    }
    for warning in &outcome.warnings {
        println!("Warning: {warning}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use showfarm_core::SessionPhase;

    #[test]
    fn only_learner_errors_are_shown() {
        let incomplete = QuizError::IncompleteSubmission {
            answered: 3,
            total: 5,
        };
        assert_eq!(learner_message(&incomplete), Some(incomplete.to_string()));

        let wrong_state = QuizError::InvalidStateTransition {
            phase: SessionPhase::Submitted,
            operation: "submit",
        };
        assert_eq!(learner_message(&wrong_state), None);
    }
}
