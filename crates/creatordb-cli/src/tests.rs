use super::*;

#[test]
fn parses_db_ping_command() {
    let cli =
        Cli::try_parse_from(["creatordb-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["creatordb-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["creatordb-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn harvest_defaults_to_content_and_database() {
    let cli = Cli::try_parse_from(["creatordb-cli", "harvest", "@someone"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Harvest {
            platform: None,
            ref target,
            no_content: false,
            resume: false,
            dry_run: false,
            json: false,
        }) if target == "@someone"
    ));
}

#[test]
fn harvest_accepts_platform_aliases() {
    let cli = Cli::try_parse_from([
        "creatordb-cli",
        "harvest",
        "--platform",
        "yt",
        "--no-content",
        "--dry-run",
        "UCabcdefghijklmnopqrstuv",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Harvest {
            platform: Some(Platform::YouTube),
            no_content: true,
            dry_run: true,
            ..
        })
    ));
}

#[test]
fn harvest_rejects_unknown_platform() {
    let result = Cli::try_parse_from(["creatordb-cli", "harvest", "--platform", "myspace", "x"]);
    assert!(result.is_err());
}

#[test]
fn harvest_requires_a_target() {
    assert!(Cli::try_parse_from(["creatordb-cli", "harvest"]).is_err());
}

#[test]
fn harvest_all_defaults() {
    let cli = Cli::try_parse_from(["creatordb-cli", "harvest-all"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::HarvestAll {
            from_db: false,
            stale_hours: 24,
            limit: 100,
            resume: false,
            dry_run: false,
        })
    ));
}

#[test]
fn harvest_all_from_db_with_stale_window() {
    let cli = Cli::try_parse_from([
        "creatordb-cli",
        "harvest-all",
        "--from-db",
        "--stale-hours",
        "6",
        "--resume",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::HarvestAll {
            from_db: true,
            stale_hours: 6,
            resume: true,
            ..
        })
    ));
}

#[test]
fn harvest_all_from_db_conflicts_with_dry_run() {
    let result = Cli::try_parse_from(["creatordb-cli", "harvest-all", "--from-db", "--dry-run"]);
    assert!(result.is_err());
}
