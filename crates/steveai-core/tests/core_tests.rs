//! Tests for steveai-core: types, commands, config, errors

use steveai_core::*;
use std::path::PathBuf;

// ===========================================================================
// ConversationId
// ===========================================================================

#[test]
fn conversation_id_new_and_display() {
    let id = ConversationId::new("abc-123");
    assert_eq!(id.as_str(), "abc-123");
    assert_eq!(format!("{}", id), "abc-123");
}

#[test]
fn conversation_id_from_string() {
    let id: ConversationId = "hello".into();
    assert_eq!(id.as_str(), "hello");
    let id2: ConversationId = String::from("world").into();
    assert_eq!(id2.as_str(), "world");
}

#[test]
fn conversation_id_generate_is_unique_and_file_safe() {
    let a = ConversationId::generate();
    let b = ConversationId::generate();
    assert_ne!(a, b);
    assert!(a.is_file_safe());
}

#[test]
fn conversation_id_rejects_path_characters() {
    assert!(!ConversationId::new("../etc/passwd").is_file_safe());
    assert!(!ConversationId::new("").is_file_safe());
    assert!(ConversationId::new("tab_1-main").is_file_safe());
}

#[test]
fn conversation_id_serializes_as_plain_string() {
    let id = ConversationId::new("tab-1");
    assert_eq!(serde_json::to_string(&id).unwrap(), r#""tab-1""#);
}

// ===========================================================================
// Role / Mode / Theme
// ===========================================================================

#[test]
fn role_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Role::System).unwrap(), r#""system""#);
    assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
    assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), r#""assistant""#);
}

#[test]
fn mode_parse_and_display() {
    for mode in Mode::ALL {
        let parsed: Mode = mode.as_str().parse().unwrap();
        assert_eq!(parsed, mode);
    }
    assert_eq!("REASONING".parse::<Mode>().unwrap(), Mode::Reasoning);
    assert!("turbo".parse::<Mode>().is_err());
    assert_eq!(Mode::default(), Mode::Chat);
}

#[test]
fn theme_toggle() {
    assert_eq!(Theme::Dark.toggled(), Theme::Light);
    assert_eq!(Theme::Light.toggled(), Theme::Dark);
    assert_eq!("light".parse::<Theme>().unwrap(), Theme::Light);
}

// ===========================================================================
// Command
// ===========================================================================

#[test]
fn command_clear_and_help() {
    assert_eq!(Command::parse("/clear"), Some(Command::Clear));
    assert_eq!(Command::parse("/help"), Some(Command::Help));
}

#[test]
fn command_theme_variants() {
    assert_eq!(Command::parse("/theme"), Some(Command::Theme(None)));
    assert_eq!(Command::parse("/theme light"), Some(Command::Theme(Some(Theme::Light))));
    assert!(matches!(Command::parse("/theme neon"), Some(Command::Usage(_))));
}

#[test]
fn command_model_variants() {
    assert_eq!(Command::parse("/model"), Some(Command::Model(None)));
    assert_eq!(
        Command::parse("/model reasoning"),
        Some(Command::Model(Some(Mode::Reasoning)))
    );
    assert!(matches!(Command::parse("/model gpt-9"), Some(Command::Usage(_))));
}

#[test]
fn command_export_with_and_without_path() {
    assert_eq!(Command::parse("/export"), Some(Command::Export(None)));
    assert_eq!(
        Command::parse("/export out.json"),
        Some(Command::Export(Some(PathBuf::from("out.json"))))
    );
    assert_eq!(
        Command::parse("/export my chat.json"),
        Some(Command::Export(Some(PathBuf::from("my chat.json"))))
    );
}

#[test]
fn command_dagi_variants() {
    assert_eq!(Command::parse("/dagi"), Some(Command::Orchestrate(None)));
    assert_eq!(Command::parse("/dagi ON"), Some(Command::Orchestrate(Some(true))));
    assert_eq!(Command::parse("/dagi off"), Some(Command::Orchestrate(Some(false))));
    assert!(matches!(Command::parse("/dagi maybe"), Some(Command::Usage(_))));
}

#[test]
fn command_image_joins_prompt_words() {
    assert_eq!(
        Command::parse("/image a   red  fox"),
        Some(Command::Image("a red fox".into()))
    );
    assert_eq!(
        Command::parse("/image"),
        Some(Command::Usage("Usage: /image <your prompt here>"))
    );
}

#[test]
fn command_unknown_keeps_word() {
    assert_eq!(Command::parse("/dance now"), Some(Command::Unknown("dance".into())));
    assert_eq!(Command::parse("/"), Some(Command::Unknown(String::new())));
}

#[test]
fn help_text_lists_every_command() {
    for word in ["/clear", "/theme", "/model", "/export", "/image", "/dagi", "/help"] {
        assert!(HELP_TEXT.contains(word), "help text missing {}", word);
    }
}

// ===========================================================================
// Config
// ===========================================================================

#[test]
fn config_defaults() {
    let config = SteveConfig::default();
    assert_eq!(config.memory.token_budget, 2200);
    assert_eq!(config.memory.summarize_after_turns, 6);
    assert_eq!(config.memory.recent_turns_to_show, 6);
    assert_eq!(config.memory.turns_to_retain, 4);
    assert_eq!(config.memory.tokens_per_char, 0.25);
    assert_eq!(config.memory.fallback_turns, 2);
    assert_eq!(config.memory.fallback_max_chars, 800);
    assert_eq!(config.api.max_tokens, 1500);
    assert!(config.api.api_keys.is_empty());
    assert_eq!(config.models.summarizer, "provider-3/gpt-4o-mini");
    assert_eq!(config.memory.summary_max_tokens, 400);
    assert!(!config.orchestrator.enabled);
    assert_eq!(config.orchestrator.router_model, "provider-2/gemini-2.5-flash");
    assert_eq!(config.orchestrator.structure_model, "provider-1/deepseek-r1-0528");
    assert_eq!(config.orchestrator.tone_model, "provider-5/gpt-5-nano");
}

#[test]
fn config_partial_toml_keeps_other_defaults() {
    let config = SteveConfig::from_toml_str(
        r#"
[memory]
token_budget = 500

[models]
chat = "custom/model"

[orchestrator]
enabled = true
"#,
    )
    .unwrap();
    assert_eq!(config.memory.token_budget, 500);
    assert_eq!(config.memory.turns_to_retain, 4);
    assert_eq!(config.models.chat, "custom/model");
    assert_eq!(config.models.for_mode(Mode::Chat), "custom/model");
    assert_eq!(config.models.for_mode(Mode::Reasoning), "provider-3/deepseek-v3-0324");
    assert!(config.orchestrator.enabled);
    assert_eq!(config.orchestrator.router_model, "provider-2/gemini-2.5-flash");
}

#[test]
fn config_rejects_non_positive_token_ratio() {
    let err = SteveConfig::from_toml_str("[memory]\ntokens_per_char = 0.0\n").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn config_rejects_malformed_toml() {
    let err = SteveConfig::from_toml_str("[memory\n").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn config_load_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = SteveConfig::load(&dir.path().join("missing.toml"));
    assert_eq!(config.memory.token_budget, 2200);
}

#[test]
fn config_load_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("steveai.toml");
    std::fs::write(&path, "[api]\ntemperature = 0.2\n").unwrap();
    let config = SteveConfig::load(&path);
    assert_eq!(config.api.temperature, 0.2);
}

#[test]
fn config_to_toml_roundtrips_without_keys() {
    let mut config = SteveConfig::default();
    config.api.api_keys = vec!["secret".into()];
    let text = config.to_toml();
    assert!(!text.contains("secret"));
    let back = SteveConfig::from_toml_str(&text).unwrap();
    assert_eq!(back.memory.token_budget, config.memory.token_budget);
    assert_eq!(back.prompts.summarizer, config.prompts.summarizer);
}

#[test]
fn api_keys_env_value_is_split_and_trimmed() {
    let mut api = ApiConfig::default();
    api.apply_keys_env(" k1 , ,k2,");
    assert_eq!(api.api_keys, vec!["k1".to_string(), "k2".to_string()]);

    api.apply_keys_env(" , ");
    assert_eq!(api.api_keys.len(), 2, "blank value keeps existing keys");
}

#[test]
fn system_prompt_combines_global_and_mode() {
    let prompts = PromptConfig::default();
    let system = prompts.system_for(Mode::Reasoning);
    assert!(system.starts_with(&prompts.global));
    assert!(system.ends_with(&prompts.reasoning));
    assert!(prompts.system_for(Mode::Fast).ends_with(&prompts.chat));
}

// ===========================================================================
// Error
// ===========================================================================

#[test]
fn error_display_messages() {
    assert_eq!(
        Error::invalid_turn("user text is empty").to_string(),
        "invalid turn input: user text is empty"
    );
    assert_eq!(
        Error::llm("a4f", "timeout").to_string(),
        "llm error: a4f - timeout"
    );
    assert_eq!(
        Error::corrupted("gap at 3").to_string(),
        "corrupted conversation state: gap at 3"
    );
}

#[test]
fn error_from_io_and_json() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    assert!(matches!(Error::from(io), Error::Io(_)));
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    assert!(matches!(Error::from(json_err), Error::Json(_)));
}
