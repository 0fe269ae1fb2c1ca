use crate::{
    backend::StudyBackend,
    celebration::CelebrationStage,
    config::EngineConfig,
    cursor::{AdvanceOutcome, RevealOutcome},
    error::EngineError,
    grading::{Answer, QuestionVariant},
    palette::Palette,
    session::{Navigation, SessionEvent, StudySession},
    utils::{ask_yn, pluralize, strip_controls_and_escapes},
};

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, MultiSelect, Select, Sort, theme::ColorfulTheme};

/// How long to wait for outstanding reconciliations before leaving.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone, Copy, Debug, Default)]
pub struct DrillOptions {
    pub shuffle: bool,
    pub restart: bool,
}

pub async fn run(
    backend: Arc<dyn StudyBackend>,
    set_id: &str,
    title: &str,
    config: EngineConfig,
    options: DrillOptions,
) -> Result<()> {
    let mut session = StudySession::start(backend, set_id, config)
        .await
        .with_context(|| format!("Failed to start a session for {title}"))?;

    if options.restart {
        session.reset();
    }
    if options.shuffle {
        session.reshuffle();
    }

    println!(
        "{} {}",
        Palette::paint(Palette::ACCENT, Palette::bold(title)),
        Palette::dim(format!(
            "({}, starting at {})",
            pluralize("item", session.items().len()),
            session.cursor_state().index + 1
        ))
    );
    print_streak(&session);

    let theme = ColorfulTheme::default();
    let loop_result = drill_loop(&mut session, &theme);

    if tokio::time::timeout(SETTLE_TIMEOUT, settle_pending(&mut session))
        .await
        .is_err()
    {
        log::warn!("leaving with reconciliations still pending");
    }
    print_streak(&session);
    session.teardown().await;

    loop_result
}

async fn settle_pending(session: &mut StudySession) {
    while session.has_pending_updates() {
        print_events(&session.next_events().await);
    }
    print_events(&session.poll_updates());
}

enum Flow {
    Continue,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CardAction {
    Reveal,
    Hide,
    Next,
    Previous,
    Record,
    Reshuffle,
    Reset,
    Quit,
}

impl CardAction {
    fn label(&self) -> &'static str {
        match self {
            CardAction::Reveal => "Reveal",
            CardAction::Hide => "Hide answer",
            CardAction::Next => "Next",
            CardAction::Previous => "Previous",
            CardAction::Record => "I said it out loud",
            CardAction::Reshuffle => "Reshuffle deck",
            CardAction::Reset => "Start over in deck order",
            CardAction::Quit => "Quit",
        }
    }

    fn menu(revealed: bool) -> Vec<CardAction> {
        let toggle = if revealed {
            CardAction::Hide
        } else {
            CardAction::Reveal
        };
        vec![
            toggle,
            CardAction::Next,
            CardAction::Previous,
            CardAction::Record,
            CardAction::Reshuffle,
            CardAction::Reset,
            CardAction::Quit,
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CheckpointAction {
    Retry,
    Skip,
    BackToDeck,
    Quit,
}

impl CheckpointAction {
    fn label(&self) -> &'static str {
        match self {
            CheckpointAction::Retry => "Try a new quiz",
            CheckpointAction::Skip => "Skip this checkpoint",
            CheckpointAction::BackToDeck => "Back to the deck",
            CheckpointAction::Quit => "Quit",
        }
    }

    fn menu(is_final: bool) -> Vec<CheckpointAction> {
        let mut actions = vec![CheckpointAction::Retry];
        if !is_final {
            actions.push(CheckpointAction::Skip);
        }
        actions.extend([CheckpointAction::BackToDeck, CheckpointAction::Quit]);
        actions
    }
}

fn drill_loop(session: &mut StudySession, theme: &ColorfulTheme) -> Result<()> {
    loop {
        print_events(&session.poll_updates());

        if session.is_completed() {
            println!("{}", Palette::paint(Palette::SUCCESS, "Deck complete!"));
            return Ok(());
        }

        if session.active_checkpoint().is_some() {
            match checkpoint_turn(session, theme)? {
                Flow::Continue => continue,
                Flow::Quit => return Ok(()),
            }
        }

        let Some(item) = session.current_item().cloned() else {
            return Ok(());
        };
        let state = session.cursor_state().clone();
        let prompt = if item.front.trim().is_empty() {
            &item.meaning
        } else {
            &item.front
        };
        println!();
        println!(
            "{} {}",
            Palette::dim(format!("[{}/{}]", state.index + 1, session.items().len())),
            Palette::bold(strip_controls_and_escapes(prompt))
        );
        if state.revealed {
            println!(
                "  {} {}",
                Palette::paint(Palette::INFO, strip_controls_and_escapes(&item.target)),
                Palette::dim(format!("({})", strip_controls_and_escapes(&item.meaning)))
            );
        }

        let actions = CardAction::menu(state.revealed);
        let labels: Vec<&str> = actions.iter().map(CardAction::label).collect();
        let default = if state.revealed { 1 } else { 0 };
        let choice = Select::with_theme(theme)
            .items(labels.as_slice())
            .default(default)
            .interact()?;

        match actions[choice] {
            CardAction::Reveal | CardAction::Hide => {
                if session.reveal() == RevealOutcome::Ignored {
                    log::debug!("reveal ignored");
                }
            }
            CardAction::Next => report(session.next()),
            CardAction::Previous => report(session.previous()),
            CardAction::Record => {
                if !session.record_recording() {
                    println!("{}", Palette::dim("Already counted for this item."));
                }
            }
            CardAction::Reshuffle => {
                if ask_yn("Reshuffle and start from the first item?")? {
                    session.reshuffle();
                }
            }
            CardAction::Reset => {
                if ask_yn("Restore deck order and start from the first item?")? {
                    session.reset();
                }
            }
            CardAction::Quit => return Ok(()),
        }
        session.settle();
    }
}

fn checkpoint_turn(session: &mut StudySession, theme: &ColorfulTheme) -> Result<Flow> {
    let Some(active) = session.active_checkpoint() else {
        return Ok(Flow::Continue);
    };
    let is_final = active.checkpoint.is_final;

    if let Some(quiz) = session.quiz() {
        let questions = quiz.questions().to_vec();
        let title = if is_final {
            "Final checkpoint".to_string()
        } else {
            format!("Checkpoint at item {}", active.checkpoint.boundary)
        };
        println!();
        println!(
            "{} {}",
            Palette::paint(Palette::ACCENT, Palette::bold(title)),
            Palette::dim(format!(
                "{} correct of {} to pass",
                quiz.required_count(),
                pluralize("question", quiz.len())
            ))
        );

        let mut answers = Vec::with_capacity(questions.len());
        for (idx, question) in questions.iter().enumerate() {
            println!("{}", Palette::dim(format!("Question {}/{}", idx + 1, questions.len())));
            answers.push(ask_question(question, theme)?);
        }

        let outcome = session.submit_quiz(&answers)?;
        let score = &outcome.score;
        let color = if score.passed {
            Palette::SUCCESS
        } else {
            Palette::DANGER
        };
        println!(
            "{}",
            Palette::paint(
                color,
                format!(
                    "{}/{} correct ({} needed): {}",
                    score.correct,
                    score.total,
                    score.required,
                    if score.passed { "passed" } else { "not yet" }
                )
            )
        );
        for (question, correct) in questions.iter().zip(&score.per_question) {
            if !correct {
                println!(
                    "  {} {}",
                    Palette::dim(question_title(question)),
                    Palette::paint(Palette::WARNING, format_answer(&question.answer_key()))
                );
            }
        }
        if let Some(navigation) = outcome.navigation {
            report(Ok(navigation));
        }
        return Ok(Flow::Continue);
    }

    let actions = CheckpointAction::menu(is_final);
    let labels: Vec<&str> = actions.iter().map(CheckpointAction::label).collect();
    let choice = Select::with_theme(theme)
        .with_prompt("What next?")
        .items(labels.as_slice())
        .default(0)
        .interact()?;

    match actions[choice] {
        CheckpointAction::Retry => {
            if let Err(err) = session.retry_checkpoint() {
                warn_user(&err);
            }
        }
        CheckpointAction::Skip => report(session.skip_checkpoint()),
        CheckpointAction::BackToDeck => session.cancel_checkpoint()?,
        CheckpointAction::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

fn ask_question(question: &QuestionVariant, theme: &ColorfulTheme) -> Result<Answer> {
    let title = question_title(question);
    let answer = match question {
        QuestionVariant::SingleChoice { options, .. }
        | QuestionVariant::ChoiceRecall { options, .. } => {
            let picked = Select::with_theme(theme)
                .with_prompt(title)
                .items(options.as_slice())
                .default(0)
                .interact()?;
            Answer::Choice(options[picked].clone())
        }
        QuestionVariant::TrueFalse { .. } => Answer::Boolean(
            Confirm::with_theme(theme)
                .with_prompt(title)
                .interact()?,
        ),
        QuestionVariant::TypedRecall { .. } | QuestionVariant::TextCorrection { .. } => {
            Answer::Text(
                Input::<String>::with_theme(theme)
                    .with_prompt(title)
                    .allow_empty(true)
                    .interact_text()?,
            )
        }
        QuestionVariant::MultiSelect { options, .. } => {
            let picked = MultiSelect::with_theme(theme)
                .with_prompt(title)
                .items(options.as_slice())
                .interact()?;
            Answer::Selection(picked.into_iter().map(|idx| options[idx].clone()).collect())
        }
        QuestionVariant::SequenceReorder { shuffled_tokens, .. } => {
            let order = Sort::with_theme(theme)
                .with_prompt(title)
                .items(shuffled_tokens.as_slice())
                .interact()?;
            Answer::Sequence(order.into_iter().map(|idx| shuffled_tokens[idx].clone()).collect())
        }
        QuestionVariant::PairMatching {
            left_items,
            right_items_shuffled,
            ..
        } => {
            println!("{}", title);
            let mut pairs = Vec::with_capacity(left_items.len());
            for left in left_items {
                let picked = Select::with_theme(theme)
                    .with_prompt(left.as_str())
                    .items(right_items_shuffled.as_slice())
                    .default(0)
                    .interact()?;
                pairs.push((left.clone(), right_items_shuffled[picked].clone()));
            }
            Answer::Pairs(pairs)
        }
    };
    Ok(answer)
}

fn question_title(question: &QuestionVariant) -> String {
    let title = match question {
        QuestionVariant::SingleChoice { prompt, .. } => format!("What does \"{prompt}\" mean?"),
        QuestionVariant::ChoiceRecall { prompt, .. } => {
            format!("Pick the meaning that goes with \"{prompt}\"")
        }
        QuestionVariant::TrueFalse {
            prompt,
            displayed_claim,
            ..
        } => format!("\"{prompt}\" means \"{displayed_claim}\""),
        QuestionVariant::TypedRecall { prompt, .. } => format!("Type the phrase for \"{prompt}\""),
        QuestionVariant::MultiSelect { prompt, .. } => {
            format!("Select every meaning of \"{prompt}\"")
        }
        QuestionVariant::SequenceReorder { hint, .. } => format!("Put the words in order: {hint}"),
        QuestionVariant::TextCorrection {
            incorrect_text,
            hint,
            ..
        } => format!("Fix the sentence \"{incorrect_text}\" ({hint})"),
        QuestionVariant::PairMatching { .. } => "Match each phrase with its meaning".to_string(),
    };
    strip_controls_and_escapes(&title)
}

fn format_answer(answer: &Answer) -> String {
    match answer {
        Answer::Choice(text) | Answer::Text(text) => text.clone(),
        Answer::Boolean(value) => if *value { "true" } else { "false" }.to_string(),
        Answer::Selection(items) => items.join(", "),
        Answer::Sequence(tokens) => tokens.join(" "),
        Answer::Pairs(pairs) => pairs
            .iter()
            .map(|(left, right)| format!("{left} = {right}"))
            .collect::<Vec<_>>()
            .join("; "),
    }
}

fn report(result: Result<Navigation, EngineError>) {
    match result {
        Ok(Navigation::Stayed(AdvanceOutcome::AtStart)) => {
            println!("{}", Palette::dim("Already at the first item."));
        }
        Ok(Navigation::CheckpointStarted {
            boundary,
            is_final,
            questions,
        }) => {
            let what = if is_final {
                "Final checkpoint".to_string()
            } else {
                format!("Checkpoint at item {boundary}")
            };
            println!(
                "{} {}",
                Palette::paint(Palette::ACCENT, what),
                Palette::dim(pluralize("question", questions))
            );
        }
        Ok(Navigation::Reviewed { boundary, .. }) => {
            println!(
                "{}",
                Palette::dim(format!("Checkpoint at item {boundary} already passed."))
            );
        }
        Ok(_) => {}
        Err(err) => warn_user(&err),
    }
}

fn warn_user(err: &EngineError) {
    println!("{}", Palette::paint(Palette::WARNING, err));
}

fn print_events(events: &[SessionEvent]) {
    for line in events.iter().filter_map(describe_event) {
        println!("{line}");
    }
}

fn describe_event(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Celebration(CelebrationStage::DeltaBadge { points }) => Some(Palette::paint(
            Palette::SUCCESS,
            format!("+{}", pluralize("point", *points as usize)),
        )),
        SessionEvent::Celebration(CelebrationStage::GoalModal { streak_days }) => Some(format!(
            "{} {}",
            Palette::paint(Palette::SUCCESS, Palette::bold("Daily goal reached!")),
            Palette::dim(format!("Streak: {}", pluralize("day", *streak_days as usize)))
        )),
        SessionEvent::PointsRolledBack { points, .. } => Some(Palette::dim(format!(
            "{} could not be saved, they will count next time",
            pluralize("point", *points as usize)
        ))),
        SessionEvent::GradingMismatch { questions, .. } => Some(Palette::dim(format!(
            "the server graded {} differently; your local result stands",
            pluralize("question", questions.len())
        ))),
        _ => None,
    }
}

fn print_streak(session: &StudySession) {
    let streak = session.streak();
    let goal = streak.daily_goal.max(1) as usize;
    println!(
        "{} {} {}",
        Palette::meter(streak.local_count as usize * 20 / goal, 20),
        Palette::dim(format!("{}/{} today", streak.local_count, streak.daily_goal)),
        Palette::dim(format!("streak {}", pluralize("day", streak.server_streak_days as usize)))
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn card_menu_toggles_reveal_label() {
        assert_eq!(CardAction::menu(false)[0], CardAction::Reveal);
        assert_eq!(CardAction::menu(true)[0], CardAction::Hide);
        assert_eq!(CardAction::menu(true).last(), Some(&CardAction::Quit));
    }

    #[test]
    fn final_checkpoint_menu_has_no_skip() {
        assert!(CheckpointAction::menu(false).contains(&CheckpointAction::Skip));
        assert!(!CheckpointAction::menu(true).contains(&CheckpointAction::Skip));
    }

    #[test]
    fn answers_are_formatted_for_review() {
        assert_eq!(format_answer(&Answer::Boolean(true)), "true");
        assert_eq!(
            format_answer(&Answer::Sequence(vec!["Ich".into(), "bin".into()])),
            "Ich bin"
        );
        assert_eq!(
            format_answer(&Answer::Pairs(vec![("ja".into(), "yes".into())])),
            "ja = yes"
        );
    }

    #[test]
    fn question_titles_strip_escapes() {
        let question = QuestionVariant::MultiSelect {
            prompt: "\x1b[31mrot".into(),
            options: vec!["red".into()],
            correct_set: BTreeSet::from(["red".to_string()]),
        };
        assert_eq!(question_title(&question), "Select every meaning of \"rot\"");
    }

    #[test]
    fn only_visible_events_are_described() {
        assert!(describe_event(&SessionEvent::Celebration(CelebrationStage::Pulse)).is_none());
        let badge = describe_event(&SessionEvent::Celebration(CelebrationStage::DeltaBadge {
            points: 2,
        }))
        .unwrap();
        assert_eq!(strip_controls_and_escapes(&badge), "+2 points");
    }
}
