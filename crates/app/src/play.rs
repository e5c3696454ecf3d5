use std::error::Error;
use std::io::{self, BufRead, Write};

use quiz_core::gate::GateDecision;
use quiz_core::model::{OptionReveal, TopicId};
use services::quiz::{ResultsView, resolve};
use services::{AppServices, QuizFlowError, QuizPhase};

pub fn announce(decision: GateDecision) {
    match decision {
        GateDecision::Allow => {}
        GateDecision::SignupPrompt { answered, limit } => {
            println!();
            println!("You've answered {answered} of {limit} free questions.");
            println!("Sign up to save your progress: secquiz signup --email <e> --password <p>");
            println!();
        }
        GateDecision::PaymentPrompt => {
            println!("Access to quizzes requires a purchase.");
            println!("After checkout, confirm it with: secquiz pay <reference>");
        }
    }
}

/// Read one trimmed line; `None` on end of input.
fn prompt(label: &str) -> io::Result<Option<String>> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_owned()))
}

pub async fn run(services: &AppServices, topic_id: TopicId, shuffle: bool) -> Result<(), Box<dyn Error>> {
    let session = services.auth().snapshot();
    let quiz = services.quiz().as_ref().clone().with_shuffle(shuffle);

    let mut start = match quiz.start(topic_id, &session).await {
        Ok(start) => start,
        Err(QuizFlowError::PaymentRequired) => {
            announce(GateDecision::PaymentPrompt);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    announce(start.gate);

    let controller = &mut start.controller;
    if let QuizPhase::Error { message, .. } = controller.phase() {
        println!("{message}");
        println!("Pick another topic from `secquiz topics`.");
        return Ok(());
    }

    loop {
        let (Some(question), Some(progress)) = (controller.current_question(), controller.progress()) else {
            break;
        };
        println!();
        println!(
            "Question {}/{}  (score {})",
            progress.position, progress.total, progress.score
        );
        println!("{}", question.prompt());
        for (i, option) in question.options().iter().enumerate() {
            println!("  {}. {option}", i + 1);
        }

        loop {
            let Some(answer) = prompt("Your answer (number, or q to quit): ")? else {
                return Ok(());
            };
            if answer.eq_ignore_ascii_case("q") {
                return Ok(());
            }
            match controller.select_input(&answer) {
                Ok(_) => break,
                Err(e) => println!("{e}"),
            }
        }

        let submitted = quiz.submit(controller)?;
        let outcome = &submitted.outcome;
        println!();
        println!("{}", if outcome.correct { "Correct!" } else { "Incorrect." });
        if let Some(question) = controller.current_question() {
            for (option, reveal) in question.options().iter().zip(&outcome.reveal) {
                let mark = match reveal {
                    OptionReveal::Correct => "+",
                    OptionReveal::Incorrect => "x",
                    OptionReveal::Neutral => " ",
                };
                println!("  [{mark}] {option}");
            }
        }
        if let Some(explanation) = &outcome.explanation {
            println!("{explanation}");
        }

        if controller.is_last() {
            break;
        }
        if prompt("Press enter for the next question...")?.is_none() {
            return Ok(());
        }
        announce(quiz.advance(controller, &session).await?);
    }

    let report = quiz.finish(controller, &session).await?;
    if let Some(notice) = &report.notice {
        println!("{notice}");
    }
    match resolve(Some(&report.results)) {
        ResultsView::Render {
            score,
            total,
            percentage,
            ..
        } => {
            println!();
            println!("Quiz complete: {score}/{total} ({percentage}%)");
            if !session.is_authenticated() {
                println!("Sign up to keep track of your results.");
            }
        }
        ResultsView::Redirect(_) => println!("Pick another topic from `secquiz topics`."),
    }
    Ok(())
}
