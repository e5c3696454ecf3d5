use std::error::Error;

use quiz_core::gate::GateDecision;
use quiz_core::model::AuthSession;
use services::AppServices;

use crate::Command;
use crate::play;

pub async fn dispatch(services: &AppServices, command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Topics => topics(services).await,
        Command::Play { topic_id, shuffle } => play::run(services, topic_id, shuffle).await,
        Command::Progress => progress(services).await,
        Command::Status => {
            status(services).await;
            Ok(())
        }
        Command::Signup {
            email,
            password,
            name,
        } => {
            let session = services.auth().sign_up(&email, &password, name).await?;
            println!("Welcome, {}.", display_name(&session));
            Ok(())
        }
        Command::Login { email, password } => {
            let session = services.auth().sign_in(&email, &password).await?;
            println!("Signed in as {}.", display_name(&session));
            Ok(())
        }
        Command::Logout => {
            services.auth().sign_out().await;
            println!("Signed out.");
            Ok(())
        }
        Command::Feedback {
            question_id,
            kind,
            text,
        } => {
            let session = services.auth().snapshot();
            let row = services
                .feedback()
                .submit(&session, question_id, kind, &text)
                .await?;
            println!("Thanks! Feedback #{} recorded.", row.id);
            Ok(())
        }
        Command::Pay { reference } => {
            let confirmation = services.payments().confirm(&reference).await?;
            if confirmation.duplicate {
                println!("Payment {reference} was already applied.");
            } else {
                println!(
                    "Payment confirmed: NGN {:.2}. Access valid until {}.",
                    confirmation.payment.amount_major(),
                    confirmation.payment.expires_at.format("%Y-%m-%d")
                );
            }
            Ok(())
        }
        Command::AdminFreemium(draft) => {
            let session = services.auth().snapshot();
            let settings = services.settings();
            let updated = if draft.enabled.is_none() && draft.question_limit.is_none() {
                settings.resolve().await
            } else {
                settings.save(&session, draft).await?
            };
            println!(
                "Freemium: {} (limit {} questions)",
                if updated.enabled() { "enabled" } else { "disabled" },
                updated.question_limit()
            );
            Ok(())
        }
        Command::AdminResetCounter => {
            let session = services.auth().snapshot();
            let counter = services.settings().reset_counter(&session).await?;
            println!("Question counter reset ({} of {}).", counter.count(), counter.limit());
            Ok(())
        }
    }
}

fn display_name(session: &AuthSession) -> String {
    session
        .user()
        .map(|u| u.name.clone().unwrap_or_else(|| u.email.clone()))
        .unwrap_or_else(|| "guest".into())
}

async fn topics(services: &AppServices) -> Result<(), Box<dyn Error>> {
    let topics = services.topics().list_topics().await?;
    if topics.is_empty() {
        println!("No topics yet. Run the seed binary first.");
        return Ok(());
    }
    for topic in &topics {
        match topic.description() {
            Some(description) => println!("{:<24} {}  - {}", topic.id(), topic.title(), description),
            None => println!("{:<24} {}", topic.id(), topic.title()),
        }
    }
    Ok(())
}

async fn progress(services: &AppServices) -> Result<(), Box<dyn Error>> {
    let session = services.auth().snapshot();
    let Some(user_id) = session.user_id() else {
        println!("Sign in to track your progress.");
        return Ok(());
    };

    let report = services.progress().report(user_id).await?;
    if report.is_empty() {
        println!("No quizzes taken yet.");
        return Ok(());
    }

    let stats = &report.stats;
    println!("Quizzes taken:    {}", stats.total_quizzes);
    println!("Average score:    {:.0}%", stats.average_score);
    println!("Topics attempted: {}", stats.topics_attempted);
    if let Some(best) = &stats.best_topic {
        println!("Best topic:       {best}");
    }

    println!();
    for topic in &report.topics {
        println!(
            "{:<28} attempts {:>3}  best {:>3.0}%  avg {:>3.0}%  last {}",
            topic.topic_title,
            topic.attempts,
            topic.best_score,
            topic.average_score,
            topic.last_attempt.format("%Y-%m-%d")
        );
    }

    if !stats.recent_activity.is_empty() {
        println!();
        println!("Recent activity:");
        for attempt in &stats.recent_activity {
            println!(
                "  {}  {}  {}/{}",
                attempt.completed_at.format("%Y-%m-%d %H:%M"),
                attempt.topic_title.as_deref().unwrap_or(attempt.topic_id.as_str()),
                attempt.score,
                attempt.total_questions
            );
        }
    }
    Ok(())
}

async fn status(services: &AppServices) {
    let session = services.auth().snapshot();
    let access = services.access();
    let counter = services.counter().snapshot();

    println!("Signed in as:     {}", display_name(&session));
    println!(
        "Questions answered: {} (limit {})",
        counter.count(),
        counter.limit()
    );
    if let Some(left) = access.free_questions_left(&session).await {
        println!("Free questions left: {left}");
    }
    match access.evaluate(&session).await {
        GateDecision::Allow => {}
        decision => play::announce(decision),
    }
}
