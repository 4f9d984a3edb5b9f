use routedoc::cli::{self, CliArgs, OutputFormat, Profile};
use routedoc::framework::FrameworkCaps;
use routedoc::store::HandlerMetadataStore;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

/// Helper function to create a temporary test project
fn create_test_project(files: Vec<(&str, &str)>) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    for (path, content) in files {
        let file_path = temp_dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&file_path, content).expect("Failed to write test file");
    }

    temp_dir
}

#[test]
fn test_context_project_end_to_end() {
    let code = include_str!("fixtures/context_project.rs");
    let temp_dir = create_test_project(vec![("src/handlers.rs", code)]);
    let dir = temp_dir.path().join("src");

    let store = HandlerMetadataStore::new(FrameworkCaps::context_style("Context"));
    let metadata = store.lookup("create_user", &dir);

    // Doc comment extraction
    assert_eq!(metadata.info.summary, "Creates a user");
    assert_eq!(
        metadata.info.description,
        "Persists the payload and returns the stored record"
    );
    assert_eq!(metadata.info.parameters.len(), 1);
    assert_eq!(metadata.info.parameters[0].name, "tenant");
    assert!(metadata.info.parameters[0].required);

    // Request body: bound struct shaped by its attributes
    let body = metadata.request_body.expect("Should detect request body");
    assert_eq!(body.content_type, "application/json");
    assert!(body.required);
    let properties = body.schema.properties.expect("Body schema has properties");
    assert!(properties.contains_key("name"));
    assert!(properties.contains_key("age"));
    assert!(properties.contains_key("isAdmin"));
    assert!(properties.contains_key("nickname"));
    assert!(!properties.contains_key("internal_token"));
    assert_eq!(body.schema.required, Some(vec!["name".to_string()]));
    assert_eq!(body.example["isAdmin"], json!(false));

    // Responses: created path plus the bind-failure branch
    assert_eq!(metadata.responses.len(), 2);
    let created = &metadata.responses["201"];
    assert_eq!(created.description, "Created");
    assert_eq!(created.content_type, "application/json");
    let created_schema = created.schema.as_ref().expect("201 carries a schema");
    let user_props = created_schema.properties.as_ref().unwrap();
    assert_eq!(
        user_props["id"].description.as_deref(),
        Some("Unique identifier")
    );
    // The self-referential friends list terminates as an object item.
    assert_eq!(user_props["friends"].schema_type, "array");
    assert_eq!(
        user_props["friends"].items.as_ref().unwrap().schema_type,
        "object"
    );

    let bad_request = &metadata.responses["400"];
    assert_eq!(bad_request.description, "Bad Request");
    assert_eq!(bad_request.content_type, "text/plain");
    assert_eq!(bad_request.example, Some(json!("invalid payload")));
}

#[test]
fn test_bodyless_response_and_plain_handler() {
    let code = include_str!("fixtures/context_project.rs");
    let temp_dir = create_test_project(vec![("src/handlers.rs", code)]);
    let dir = temp_dir.path().join("src");

    let store = HandlerMetadataStore::new(FrameworkCaps::context_style("Context"));

    let deleted = store.lookup("delete_user", &dir);
    let no_content = &deleted.responses["204"];
    assert_eq!(no_content.description, "No Content");
    assert!(no_content.schema.is_none());
    assert!(no_content.example.is_none());

    let health = store.lookup("health", &dir);
    assert_eq!(health.info.summary, "Health probe");
    assert_eq!(health.responses["200"].example, Some(json!("ok")));
}

#[test]
fn test_repeated_lookups_analyze_once() {
    let code = include_str!("fixtures/context_project.rs");
    let temp_dir = create_test_project(vec![("src/handlers.rs", code)]);
    let dir = temp_dir.path().join("src");

    let store = HandlerMetadataStore::new(FrameworkCaps::context_style("Context"));
    let first = store.lookup("create_user", &dir);
    let _ = store.lookup("health", &dir);
    let _ = store.lookup("delete_user", &dir);
    let again = store.lookup("create_user", &dir);

    assert_eq!(first, again);
    assert_eq!(store.analysis_runs(), 1);
}

#[test]
fn test_concurrent_cold_lookups_analyze_once() {
    let code = include_str!("fixtures/context_project.rs");
    let temp_dir = create_test_project(vec![("src/handlers.rs", code)]);
    let dir = temp_dir.path().join("src");

    let store = Arc::new(HandlerMetadataStore::new(FrameworkCaps::context_style(
        "Context",
    )));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let dir = dir.clone();
            std::thread::spawn(move || store.lookup("create_user", &dir))
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("Lookup thread panicked"))
        .collect();

    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    assert!(results[0].request_body.is_some());
    assert_eq!(store.analysis_runs(), 1);
}

#[test]
fn test_writer_request_project() {
    let temp_dir = create_test_project(vec![(
        "src/handlers.rs",
        r#"
        pub struct Event {
            pub kind: String,
            pub payload: serde_json::Value,
        }

        pub fn publish(w: &mut ResponseWriter, req: &Request) {
            let event = Event { kind: "created", payload: body };
            w.write(serde_json::to_vec(&event));
        }
        "#,
    )]);
    let dir = temp_dir.path().join("src");

    let store = HandlerMetadataStore::new(FrameworkCaps::writer_request_style(
        "ResponseWriter",
        "Request",
    ));
    let metadata = store.lookup("publish", &dir);

    let response = &metadata.responses["200"];
    let schema = response.schema.as_ref().expect("200 carries a schema");
    let properties = schema.properties.as_ref().unwrap();
    assert_eq!(properties["kind"].schema_type, "string");
    // serde_json::Value degrades to an open object.
    assert_eq!(properties["payload"].schema_type, "object");
    assert_eq!(response.example.as_ref().unwrap()["kind"], json!("created"));
}

#[test]
fn test_cli_run_writes_report() {
    let code = include_str!("fixtures/context_project.rs");
    let temp_dir = create_test_project(vec![("src/handlers.rs", code)]);
    let output_path = temp_dir.path().join("report.json");

    let args = CliArgs {
        project_path: temp_dir.path().to_path_buf(),
        output_format: OutputFormat::Json,
        output_path: Some(output_path.clone()),
        profile: Profile::Context,
        context_type: "Context".to_string(),
        writer_type: "ResponseWriter".to_string(),
        request_type: "Request".to_string(),
        verbose: false,
    };

    cli::run(args).expect("CLI run should succeed");

    let content = std::fs::read_to_string(&output_path).expect("Report file written");
    let report: serde_json::Value = serde_json::from_str(&content).expect("Report is valid JSON");

    let directories = report.as_array().expect("Report is a directory list");
    assert_eq!(directories.len(), 1);
    let handlers = directories[0]["handlers"]
        .as_array()
        .expect("Directory lists handlers");
    assert_eq!(handlers.len(), 3);
    // Sorted by declaration position within the file.
    assert_eq!(handlers[0]["func_name"], json!("create_user"));
    assert_eq!(handlers[2]["func_name"], json!("delete_user"));
}
