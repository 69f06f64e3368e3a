use std::io::Write;

use portlet_container::core::config::LogFormat;
use portlet_container::core::{create_default_app_state, load_config, load_config_or_default};
use portlet_container::portlet::HostRequest;
use portlet_container::services::builtin::{ConfigService, LogService, CONFIG_BASE, LOG_BASE};
use portlet_container::Error;
use tempfile::NamedTempFile;

const CONFIG: &str = r#"
[server]
name = "intranet"

[server.init_parameters]
region = "eu"

[application]
name = "portal"
context_path = "/portal"

[logging]
level = "warn"
format = "compact"

[[service]]
base = "log"
implementation = "tracing-log"
properties = { channel = "audit" }

[[service]]
base = "config"
implementation = "properties-config"
properties = { required = ["region"] }

[[portlet]]
id = "greeter"
implementation = "hello"
init_parameters = { greeting = "Welcome" }

[[portlet]]
id = "visits"
implementation = "counter"
"#;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn loaded_config_drives_a_full_startup() {
    let file = write_config(CONFIG);
    let config = load_config(file.path()).unwrap();
    assert_eq!(config.logging.format, LogFormat::Compact);
    assert_eq!(config.portlets.len(), 2);

    let state = create_default_app_state(config).unwrap();
    state.startup().unwrap();

    assert!(state.services.is_initialized());
    assert_eq!(state.services.service::<LogService>(LOG_BASE).unwrap().channel(), "audit");
    assert_eq!(
        state.services.service::<ConfigService>(CONFIG_BASE).unwrap().get("region"),
        Some("eu")
    );
    assert_eq!(state.registry.loaded_count(), 2);

    let response = state
        .render("greeter", &mut HostRequest::new("/portal").with_parameter("name", "Kim"))
        .unwrap();
    assert_eq!(response.body(), "<p>Welcome, Kim!</p>");

    state.action("visits", &mut HostRequest::new("/portal")).unwrap();
    let response = state.render("visits", &mut HostRequest::new("/portal")).unwrap();
    assert_eq!(response.body(), "1");

    let err = state.render("missing", &mut HostRequest::new("/portal")).unwrap_err();
    assert!(matches!(err, Error::Resolution(_)));

    assert!(state.collect_metrics().contains("pc_services_initialized_total 2"));

    state.shutdown();
    assert!(!state.services.is_initialized());
    assert_eq!(state.registry.loaded_count(), 0);
    let err = state.render("greeter", &mut HostRequest::new("/portal")).unwrap_err();
    assert!(matches!(err, Error::ShutDown));
}

#[test]
fn malformed_file_is_a_config_error() {
    let file = write_config("[server\nname = ");
    assert!(matches!(load_config(file.path()), Err(Error::Config(_))));
}

#[test]
fn duplicate_portlet_ids_are_rejected() {
    let file = write_config(
        r#"
[[portlet]]
id = "a"
implementation = "hello"

[[portlet]]
id = "a"
implementation = "counter"
"#,
    );
    assert!(matches!(load_config(file.path()), Err(Error::Config(_))));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_or_default(Some(dir.path().join("absent.toml").as_path()));
    assert!(config.services.is_empty());
    assert_eq!(config.server.name, "portlet-container");
}

#[test]
fn bad_service_fails_startup() {
    // Goal: an unresolvable [[service]] fails startup loudly, and the service
    // that did come up is still torn down by shutdown
    let file = write_config(
        r#"
[[service]]
base = "log"
implementation = "tracing-log"

[[service]]
base = "log2"
implementation = "nope"
"#,
    );
    let state = create_default_app_state(load_config(file.path()).unwrap()).unwrap();

    let err = state.startup().unwrap_err();
    assert!(matches!(err, Error::PartialInitialization { successful: 1, attempted: 2 }));
    assert!(state.services.service::<LogService>(LOG_BASE).is_some());

    state.shutdown();
    assert!(!state.services.is_initialized());
    assert_eq!(state.services.service_count(), 0);
}
