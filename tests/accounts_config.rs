// tests/accounts_config.rs
use std::{env, fs};

use tweet_notifier::accounts::{load_accounts_default, load_accounts_from, ENV_ACCOUNTS_PATH};
use tweet_notifier::config::{AppConfig, SmtpConfig};
use tweet_notifier::error::ConfigError;
use tweet_notifier::tracking::AccountRequest;

#[test]
fn parse_toml_and_json_paths() {
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("accounts.toml");
    fs::write(
        &p_toml,
        r#"
[[accounts]]
link = "https://twitter.com/Alice/"
keywords = "launch, release"
"#,
    )
    .unwrap();
    assert_eq!(
        load_accounts_from(&p_toml).unwrap(),
        vec![AccountRequest::new("alice", "launch, release")]
    );

    let p_json = dir.path().join("accounts.json");
    fs::write(&p_json, r#"[{"handle": "bob", "keywords": "rates"}]"#).unwrap();
    assert_eq!(
        load_accounts_from(&p_json).unwrap(),
        vec![AccountRequest::new("bob", "rates")]
    );

    let p_bad = dir.path().join("accounts.txt");
    fs::write(&p_bad, "alice launch").unwrap();
    assert!(matches!(
        load_accounts_from(&p_bad),
        Err(ConfigError::UnsupportedFormat(_))
    ));
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // Isolate CWD so the real config/ is not read.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_ACCOUNTS_PATH);

    // 1) Nothing present
    assert!(matches!(
        load_accounts_default(),
        Err(ConfigError::AccountsNotFound(_))
    ));

    // 2) Fallback JSON in ./config/
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(
        cfg_dir.join("accounts.json"),
        r#"[{"handle": "carol", "keywords": "x"}]"#,
    )
    .unwrap();
    assert_eq!(
        load_accounts_default().unwrap(),
        vec![AccountRequest::new("carol", "x")]
    );

    // 3) Env wins
    let p_env = tmp.path().join("mine.toml");
    fs::write(&p_env, "[[accounts]]\nhandle = \"dave\"\nkeywords = \"y\"\n").unwrap();
    env::set_var(ENV_ACCOUNTS_PATH, p_env.display().to_string());
    assert_eq!(
        load_accounts_default().unwrap(),
        vec![AccountRequest::new("dave", "y")]
    );

    // 4) Env pointing nowhere is an error, not a fallback
    env::set_var(ENV_ACCOUNTS_PATH, tmp.path().join("missing.toml"));
    assert!(load_accounts_default().is_err());
    env::remove_var(ENV_ACCOUNTS_PATH);

    env::set_current_dir(&old).unwrap();
}

fn clear_smtp_env() {
    for k in [
        "SMTP_HOST",
        "SMTP_PORT",
        "SMTP_USERNAME",
        "SMTP_PASSWORD",
        "NOTIFY_EMAIL_FROM",
        "NOTIFY_EMAIL_TO",
    ] {
        env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn missing_bearer_token_is_fatal() {
    clear_smtp_env();
    env::remove_var("TWITTER_BEARER_TOKEN");
    assert!(matches!(
        AppConfig::from_env(),
        Err(ConfigError::MissingCredential("TWITTER_BEARER_TOKEN"))
    ));

    env::set_var("TWITTER_BEARER_TOKEN", "t0k3n");
    env::set_var("POLL_INTERVAL_SECS", "45");
    let cfg = AppConfig::from_env().unwrap();
    assert_eq!(cfg.poll_interval.as_secs(), 45);
    assert_eq!(cfg.keyword_delimiter, ",");
    assert!(cfg.smtp.is_none());

    env::set_var("POLL_INTERVAL_SECS", "often");
    assert!(matches!(
        AppConfig::from_env(),
        Err(ConfigError::InvalidValue { .. })
    ));

    env::remove_var("POLL_INTERVAL_SECS");
    env::remove_var("TWITTER_BEARER_TOKEN");
}

#[serial_test::serial]
#[test]
fn partial_smtp_config_is_rejected() {
    clear_smtp_env();
    env::set_var("SMTP_HOST", "smtp.example.com");
    match SmtpConfig::from_env() {
        Err(ConfigError::IncompleteSmtp(missing)) => {
            assert_eq!(missing, vec!["SMTP_USERNAME", "SMTP_PASSWORD", "NOTIFY_EMAIL_TO"]);
        }
        other => panic!("expected IncompleteSmtp, got {other:?}"),
    }

    env::set_var("SMTP_USERNAME", "bot@example.com");
    env::set_var("SMTP_PASSWORD", "secret");
    env::set_var("NOTIFY_EMAIL_TO", "a@example.com, b@example.com");
    let smtp = SmtpConfig::from_env().unwrap().unwrap();
    assert_eq!(smtp.port, 465);
    assert_eq!(smtp.from, "bot@example.com");
    assert_eq!(smtp.receivers, vec!["a@example.com", "b@example.com"]);

    clear_smtp_env();
}

#[serial_test::serial]
#[test]
fn blank_receiver_list_is_rejected() {
    clear_smtp_env();
    env::set_var("SMTP_HOST", "smtp.example.com");
    env::set_var("SMTP_USERNAME", "bot@example.com");
    env::set_var("SMTP_PASSWORD", "secret");
    env::set_var("NOTIFY_EMAIL_TO", " , ");

    match SmtpConfig::from_env() {
        Err(ConfigError::IncompleteSmtp(missing)) => assert_eq!(missing, vec!["NOTIFY_EMAIL_TO"]),
        other => panic!("expected IncompleteSmtp, got {other:?}"),
    }

    clear_smtp_env();
}
