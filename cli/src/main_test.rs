use super::*;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("stagedoor-cli").chain(args.iter().copied())).unwrap()
}

#[test]
fn flags_override_environment() {
    let cli = parse(&["--base-url", "http://flag.test", "--catalog-auth", "true", "status"]);
    let env = |key: &str| match key {
        config::API_BASE_URL_VAR => Some("http://env.test".to_owned()),
        config::CATALOG_URL_VAR => Some("http://env.test/catalog".to_owned()),
        _ => None,
    };
    let cfg = load_config(&cli, env).unwrap();
    assert_eq!(cfg.api_base_url, "http://flag.test");
    assert_eq!(cfg.catalog_url, "http://env.test/catalog");
    assert_eq!(cfg.catalog_access, stagedoor::Access::Authenticated);
}

#[test]
fn missing_base_url_is_reported() {
    let cli = parse(&["status"]);
    assert!(matches!(load_config(&cli, |_| None), Err(ConfigError::Missing { .. })));
}

#[test]
fn session_path_prefers_explicit_file() {
    let explicit = PathBuf::from("/tmp/s.json");
    assert_eq!(session_path(Some(explicit.clone()), Some(PathBuf::from("/cfg"))).unwrap(), explicit);
    assert_eq!(
        session_path(None, Some(PathBuf::from("/cfg"))).unwrap(),
        PathBuf::from("/cfg/stagedoor/session.json")
    );
    assert!(matches!(session_path(None, None), Err(CliError::NoSessionFile)));
}

#[test]
fn theatre_update_parses_flattened_fields() {
    let cli = parse(&["theatre", "update", "7", "--title", "Globe"]);
    let Command::Theatre(TheatreCommand { command: TheatreSubcommand::Update { id, fields } }) = cli.command else {
        panic!("expected theatre update");
    };
    assert_eq!(id, "7");
    let record: Theatre = fields.into();
    assert_eq!(record.title, "Globe");
    assert_eq!(record.description, "");
    assert_eq!(record.id, None);
}

#[test]
fn api_errors_map_to_cli_errors() {
    assert!(matches!(CliError::from(ApiError::SessionInvalidated), CliError::SessionExpired));
    let rejected = ApiError::Rejected { status: 409, payload: json!({ "message": "Title taken" }) };
    match CliError::from(rejected) {
        CliError::Server { status, message } => {
            assert_eq!(status, 409);
            assert_eq!(message, "Title taken");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(CliError::from(ApiError::NoRefreshToken), CliError::Request(_)));
}

#[test]
fn route_decisions_are_described() {
    assert_eq!(describe_decision(&AppRoute::Profile, GuardDecision::Redirect("/")), "redirect /profile -> /");
    assert_eq!(
        describe_decision(&AppRoute::ViewTheatre { id: "3".to_owned() }, GuardDecision::Render),
        "render /theatre/3"
    );
}
