use std::fmt;

use chrono::{DateTime, Duration, Utc};
use quiz_core::model::{
    APP_SETTINGS_KEY, FREE_QUESTIONS_LIMIT_KEY, FreemiumSettings, QuestionDraft, QuestionId,
    SettingEntry, Topic, TopicId,
};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    admin_email: Option<String>,
    free_limit: u32,
    freemium: bool,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidFreeLimit { raw: String },
    InvalidFreemium { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidFreeLimit { raw } => write!(f, "invalid --free-limit value: {raw}"),
            ArgsError::InvalidFreemium { raw } => {
                write!(f, "invalid --freemium value (expected true/false): {raw}")
            }
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("SECQUIZ_DB_URL").unwrap_or_else(|_| "sqlite://secquiz.sqlite3".into());
        let mut admin_email = std::env::var("SECQUIZ_ADMIN_EMAIL").ok();
        let mut free_limit = std::env::var("SECQUIZ_FREE_LIMIT")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(FreemiumSettings::default().question_limit());
        let mut freemium = true;
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--admin-email" => {
                    admin_email = Some(require_value(&mut args, "--admin-email")?);
                }
                "--free-limit" => {
                    let value = require_value(&mut args, "--free-limit")?;
                    free_limit = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidFreeLimit { raw: value.clone() })?;
                }
                "--freemium" => {
                    let value = require_value(&mut args, "--freemium")?;
                    freemium = value
                        .parse::<bool>()
                        .map_err(|_| ArgsError::InvalidFreemium { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            admin_email,
            free_limit,
            freemium,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://secquiz.sqlite3)");
    eprintln!("  --admin-email <email>     Promote the signed-up profile with this email to admin");
    eprintln!("  --free-limit <n>          Free questions before the sign-up prompt (default: 10)");
    eprintln!("  --freemium <true|false>   Enable the freemium limit (default: true)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  SECQUIZ_DB_URL, SECQUIZ_ADMIN_EMAIL, SECQUIZ_FREE_LIMIT");
}

struct SampleQuestion {
    prompt: &'static str,
    options: &'static [&'static str],
    correct: &'static str,
    explanation: &'static str,
}

struct SampleTopic {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    questions: &'static [SampleQuestion],
}

const CATALOG: &[SampleTopic] = &[
    SampleTopic {
        id: "network-security",
        title: "Network Security",
        description: "Firewalls, ports, and protocols that keep traffic safe.",
        questions: &[
            SampleQuestion {
                prompt: "Which port does HTTPS use by default?",
                options: &["21", "80", "443", "8080"],
                correct: "443",
                explanation: "HTTPS is HTTP over TLS and listens on port 443 by default.",
            },
            SampleQuestion {
                prompt: "What does a stateful firewall track?",
                options: &[
                    "Only source IP addresses",
                    "The state of active connections",
                    "User passwords",
                    "DNS cache entries",
                ],
                correct: "The state of active connections",
                explanation: "Stateful firewalls allow return traffic that belongs to an established connection.",
            },
            SampleQuestion {
                prompt: "Which protocol replaced Telnet for secure remote shells?",
                options: &["FTP", "SSH", "SNMP", "RDP"],
                correct: "SSH",
                explanation: "SSH encrypts the session, unlike Telnet which sends credentials in clear text.",
            },
        ],
    },
    SampleTopic {
        id: "application-security",
        title: "Application Security",
        description: "Common web vulnerabilities and how to prevent them.",
        questions: &[
            SampleQuestion {
                prompt: "Which defence best prevents SQL injection?",
                options: &[
                    "Parameterized queries",
                    "Client-side validation",
                    "Longer passwords",
                    "HTTPS",
                ],
                correct: "Parameterized queries",
                explanation: "Bound parameters keep user input out of the query structure.",
            },
            SampleQuestion {
                prompt: "What does the HttpOnly cookie flag prevent?",
                options: &[
                    "Cookies being sent over HTTP",
                    "JavaScript reading the cookie",
                    "Cookie expiry",
                    "Cross-origin requests",
                ],
                correct: "JavaScript reading the cookie",
                explanation: "HttpOnly hides the cookie from document.cookie, limiting XSS session theft.",
            },
        ],
    },
    SampleTopic {
        id: "cryptography",
        title: "Cryptography",
        description: "Hashes, ciphers, and keys.",
        questions: &[
            SampleQuestion {
                prompt: "Which of these is a password hashing function?",
                options: &["MD5", "bcrypt", "Base64", "ROT13"],
                correct: "bcrypt",
                explanation: "bcrypt is deliberately slow and salted, unlike general-purpose hashes.",
            },
            SampleQuestion {
                prompt: "AES is an example of what kind of cipher?",
                options: &["Asymmetric", "Symmetric", "Hash", "Stream-only"],
                correct: "Symmetric",
                explanation: "AES uses the same key to encrypt and decrypt.",
            },
        ],
    },
];

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let mut question_count = 0_usize;
    for (t, sample) in (0_i64..).zip(CATALOG) {
        let topic_id = TopicId::new(sample.id);
        let topic = Topic::new(
            topic_id.clone(),
            sample.title,
            Some(sample.description.to_owned()),
            None,
            now + Duration::seconds(t),
        )?;
        storage.topics.upsert_topic(&topic).await?;

        for (i, q) in sample.questions.iter().enumerate() {
            let question = QuestionDraft {
                topic_id: Some(topic_id.clone()),
                prompt: q.prompt.to_owned(),
                options: q.options.iter().map(|o| (*o).to_owned()).collect(),
                correct_answer: q.correct.to_owned(),
                explanation: Some(q.explanation.to_owned()),
            }
            .validate()?
            .assign_id(QuestionId::new(format!("{}-{}", sample.id, i + 1)));
            storage.questions.upsert_question(&question).await?;
            question_count += 1;
        }
    }

    let admin_id = match args.admin_email.as_deref() {
        Some(email) => match storage.profiles.find_profile_by_email(email).await? {
            Some(mut profile) => {
                profile.set_admin(true);
                storage.profiles.upsert_profile(&profile).await?;
                Some(profile.id())
            }
            None => {
                eprintln!("No profile for {email}; sign up first, then seed again to promote it.");
                None
            }
        },
        None => None,
    };

    let settings = FreemiumSettings::new(args.freemium, args.free_limit);
    for (key, value) in [
        (FREE_QUESTIONS_LIMIT_KEY, settings.limit_value()),
        (APP_SETTINGS_KEY, settings.app_settings_value()),
    ] {
        storage
            .settings
            .put_setting(&SettingEntry {
                key: key.to_owned(),
                value,
                updated_by: admin_id,
                updated_at: now,
            })
            .await?;
    }

    println!(
        "Seeded {} topics with {} questions into {}",
        CATALOG.len(),
        question_count,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
