use agent_registry::entity::EntityType;
use agent_registry::tooling::cli::{Cli, Commands, ValidationCommands};
use clap::{CommandFactory, Parser};

#[test]
fn parse_valid_command_matrix() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["agent-registry", "resolve", "profile", "ada"],
        vec!["agent-registry", "resolve", "creations", "a", "b", "--deadline-ms", "250"],
        vec!["agent-registry", "import", "items.jsonl"],
        vec!["agent-registry", "import", "items.json", "--deadline-ms", "1000"],
        vec!["agent-registry", "validation", "status"],
        vec!["agent-registry", "validation", "check", "profiles", "{}"],
        vec!["agent-registry", "archive", "webhook", "deploy-hook"],
        vec!["agent-registry", "health", "--format", "json"],
        vec!["agent-registry", "--config", "registry.toml", "--log-level", "debug", "health"],
    ];

    for args in cases {
        let parsed = Cli::try_parse_from(args.clone());
        assert!(parsed.is_ok(), "expected valid parse for args: {args:?}");
    }
}

#[test]
fn parse_rejects_invalid_commands() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["agent-registry", "resolve", "profile"],
        vec!["agent-registry", "resolve", "robot", "ada"],
        vec!["agent-registry", "import"],
        vec!["agent-registry", "validation", "check", "profiles"],
        vec!["agent-registry", "archive", "profile"],
    ];

    for args in cases {
        assert!(
            Cli::try_parse_from(args.clone()).is_err(),
            "expected parse error for args: {args:?}"
        );
    }
}

#[test]
fn entity_type_accepts_collection_names() {
    let cli = Cli::try_parse_from(["agent-registry", "archive", "applications", "console"]).unwrap();
    match cli.command {
        Commands::Archive { entity_type, .. } => assert_eq!(entity_type, EntityType::Application),
        _ => panic!("expected archive command"),
    }
}

#[test]
fn validation_check_keeps_payload_verbatim() {
    let cli = Cli::try_parse_from([
        "agent-registry",
        "validation",
        "check",
        "webhooks",
        "@payload.json",
    ])
    .unwrap();
    match cli.command {
        Commands::Validation {
            command: ValidationCommands::Check { collection, payload },
        } => {
            assert_eq!(collection, "webhooks");
            assert_eq!(payload, "@payload.json");
        }
        _ => panic!("expected validation check"),
    }
}

#[test]
fn help_lists_every_command() {
    let help = Cli::command().render_help().to_string();
    for name in ["resolve", "import", "validation", "archive", "health"] {
        assert!(help.contains(name), "help is missing {}", name);
    }
}
