use std::fmt;

use quiz_core::model::{FeedbackKind, FreemiumSettingsDraft, QuestionId, TopicId};
use services::{AppConfig, AppServices, Clock, RetryPolicy, telemetry};

mod commands;
mod play;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { what: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidDbUrl { raw: String },
    InvalidBool { flag: &'static str, raw: String },
    InvalidLimit { raw: String },
    InvalidKind { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { what } => write!(f, "missing {what}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidBool { flag, raw } => {
                write!(f, "invalid {flag} value (expected true/false): {raw}")
            }
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
            ArgsError::InvalidKind { raw } => {
                write!(f, "invalid --kind value (expected helpful/confusing/incorrect): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Topics,
    Play { topic_id: TopicId, shuffle: bool },
    Progress,
    Status,
    Signup {
        email: String,
        password: String,
        name: Option<String>,
    },
    Login {
        email: String,
        password: String,
    },
    Logout,
    Feedback {
        question_id: QuestionId,
        kind: FeedbackKind,
        text: String,
    },
    Pay { reference: String },
    AdminFreemium(FreemiumSettingsDraft),
    AdminResetCounter,
}

#[derive(Debug, Default)]
struct Flags {
    db_url: Option<String>,
    shuffle: bool,
    email: Option<String>,
    password: Option<String>,
    name: Option<String>,
    kind: Option<String>,
    text: Option<String>,
    enabled: Option<bool>,
    limit: Option<i64>,
}

struct Args {
    db_url: Option<String>,
    command: Command,
}

impl Args {
    fn parse(argv: impl IntoIterator<Item = String>) -> Result<Self, ArgsError> {
        let mut flags = Flags::default();
        let mut positionals: Vec<String> = Vec::new();

        let mut args = argv.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    flags.db_url = Some(normalize_sqlite_url(value));
                }
                "--shuffle" => flags.shuffle = true,
                "--email" => flags.email = Some(require_value(&mut args, "--email")?),
                "--password" => flags.password = Some(require_value(&mut args, "--password")?),
                "--name" => flags.name = Some(require_value(&mut args, "--name")?),
                "--kind" => flags.kind = Some(require_value(&mut args, "--kind")?),
                "--text" => flags.text = Some(require_value(&mut args, "--text")?),
                "--enabled" => {
                    let value = require_value(&mut args, "--enabled")?;
                    let parsed = value.parse::<bool>().map_err(|_| ArgsError::InvalidBool {
                        flag: "--enabled",
                        raw: value.clone(),
                    })?;
                    flags.enabled = Some(parsed);
                }
                "--limit" => {
                    let value = require_value(&mut args, "--limit")?;
                    let parsed = value
                        .parse::<i64>()
                        .map_err(|_| ArgsError::InvalidLimit { raw: value.clone() })?;
                    flags.limit = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positionals.push(arg),
            }
        }

        let db_url = flags.db_url.take();
        let command = Self::command(positionals, flags)?;
        Ok(Self { db_url, command })
    }

    fn command(positionals: Vec<String>, flags: Flags) -> Result<Command, ArgsError> {
        let mut words = positionals.into_iter();
        let Some(first) = words.next() else {
            return Err(ArgsError::MissingArgument { what: "subcommand" });
        };
        let mut next = |what: &'static str| words.next().ok_or(ArgsError::MissingArgument { what });

        let command = match first.as_str() {
            "topics" => Command::Topics,
            "play" => Command::Play {
                topic_id: TopicId::new(next("topic id")?),
                shuffle: flags.shuffle,
            },
            "progress" => Command::Progress,
            "status" => Command::Status,
            "signup" => Command::Signup {
                email: flags.email.ok_or(ArgsError::MissingValue { flag: "--email" })?,
                password: flags
                    .password
                    .ok_or(ArgsError::MissingValue { flag: "--password" })?,
                name: flags.name,
            },
            "login" => Command::Login {
                email: flags.email.ok_or(ArgsError::MissingValue { flag: "--email" })?,
                password: flags
                    .password
                    .ok_or(ArgsError::MissingValue { flag: "--password" })?,
            },
            "logout" => Command::Logout,
            "feedback" => {
                let question_id = QuestionId::new(next("question id")?);
                let raw = flags.kind.ok_or(ArgsError::MissingValue { flag: "--kind" })?;
                let kind = raw
                    .parse::<FeedbackKind>()
                    .map_err(|_| ArgsError::InvalidKind { raw: raw.clone() })?;
                Command::Feedback {
                    question_id,
                    kind,
                    text: flags.text.unwrap_or_default(),
                }
            }
            "pay" => Command::Pay {
                reference: next("payment reference")?,
            },
            "admin" => match next("admin action")?.as_str() {
                "freemium" => Command::AdminFreemium(FreemiumSettingsDraft {
                    enabled: flags.enabled,
                    question_limit: flags.limit,
                }),
                "reset-counter" => Command::AdminResetCounter,
                other => return Err(ArgsError::UnknownCommand(format!("admin {other}"))),
            },
            _ => return Err(ArgsError::UnknownCommand(first)),
        };

        if let Some(extra) = words.next() {
            return Err(ArgsError::UnknownArg(extra));
        }
        Ok(command)
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  secquiz [--db <sqlite_url>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  topics                                   List quiz topics");
    eprintln!("  play <topic-id> [--shuffle]              Take a quiz");
    eprintln!("  progress                                 Show your progress");
    eprintln!("  status                                   Show session and free questions left");
    eprintln!("  signup --email <e> --password <p> [--name <n>]");
    eprintln!("  login --email <e> --password <p>");
    eprintln!("  logout");
    eprintln!("  feedback <question-id> --kind <helpful|confusing|incorrect> [--text <t>]");
    eprintln!("  pay <reference>                          Verify a checkout reference");
    eprintln!("  admin freemium [--enabled <bool>] [--limit <n>]");
    eprintln!("  admin reset-counter");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  SECQUIZ_DB_URL, SECQUIZ_LOCAL_STORE, SECQUIZ_PAYSTACK_SECRET,");
    eprintln!("  SECQUIZ_PAYSTACK_BASE_URL, SECQUIZ_PAYMENT_WALL, RUST_LOG");
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw.starts_with("sqlite://") || raw.starts_with("sqlite::memory:") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    if argv.is_empty() {
        print_usage();
        return Ok(());
    }

    let args = Args::parse(argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let mut config = AppConfig::from_env()?;
    if let Some(db_url) = args.db_url {
        config.db_url = db_url;
    }

    let services = AppServices::sqlite(&config, Clock::system(), RetryPolicy::default()).await?;
    let session = services.auth().rehydrate().await?;
    tracing::debug!(
        db_url = %config.db_url,
        authenticated = session.is_authenticated(),
        "services ready"
    );

    commands::dispatch(&services, args.command).await
}

#[tokio::main]
async fn main() {
    telemetry::init();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(args.iter().map(|a| (*a).to_owned()))
    }

    #[test]
    fn parses_play_with_flags_in_any_position() {
        let args = parse(&["--shuffle", "play", "network-security", "--db", "sqlite://x.db"]).unwrap();
        assert_eq!(args.db_url.as_deref(), Some("sqlite://x.db"));
        assert_eq!(
            args.command,
            Command::Play {
                topic_id: TopicId::new("network-security"),
                shuffle: true
            }
        );
    }

    #[test]
    fn parses_admin_freemium_draft() {
        let args = parse(&["admin", "freemium", "--enabled", "false", "--limit", "5"]).unwrap();
        assert_eq!(
            args.command,
            Command::AdminFreemium(FreemiumSettingsDraft {
                enabled: Some(false),
                question_limit: Some(5),
            })
        );
    }

    #[test]
    fn feedback_requires_a_known_kind() {
        assert!(matches!(
            parse(&["feedback", "q1", "--kind", "meh"]),
            Err(ArgsError::InvalidKind { .. })
        ));
        let args = parse(&["feedback", "q1", "--kind", "Helpful", "--text", "nice"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Feedback { kind: FeedbackKind::Helpful, .. }
        ));
    }

    #[test]
    fn rejects_unknown_and_missing_input() {
        assert!(matches!(parse(&["dance"]), Err(ArgsError::UnknownCommand(_))));
        assert!(matches!(parse(&["play"]), Err(ArgsError::MissingArgument { .. })));
        assert!(matches!(parse(&["topics", "--verbose"]), Err(ArgsError::UnknownArg(_))));
        assert!(matches!(parse(&["signup", "--email", "a@b.c"]), Err(ArgsError::MissingValue { .. })));
        assert!(matches!(
            parse(&["login", "--email", "a@b.c"]),
            Err(ArgsError::MissingValue { flag: "--password" })
        ));
        assert!(matches!(parse(&["topics", "extra"]), Err(ArgsError::UnknownArg(_))));
    }

    #[test]
    fn relative_db_path_becomes_absolute_url() {
        let url = normalize_sqlite_url("data/secquiz.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/secquiz.sqlite3"));
    }
}
