use apispec_from_source::{
    aggregator::ApiSpecDocument,
    detector::{Framework, FrameworkDetector},
    error::Error,
    extract, extract_all, extract_tagged, extract_with_reader,
    record::HttpMethod,
    response::BodyDescriptor,
    serializer::{serialize_json, serialize_yaml},
    source::{FsSourceReader, SourceReader},
};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
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

fn express_project() -> TempDir {
    create_test_project(vec![
        ("package.json", r#"{ "dependencies": { "express": "^4.18.2" } }"#),
        ("routes/posts.js", include_str!("fixtures/express_routes.js")),
        ("controllers/postController.js", include_str!("fixtures/express_controller.js")),
        ("middleware/auth.js", "const protect = (req, res, next) => next();\n"),
    ])
}

fn django_project() -> TempDir {
    create_test_project(vec![
        ("manage.py", "import django\n"),
        ("blog/urls.py", include_str!("fixtures/django_urls.py")),
        ("blog/views.py", include_str!("fixtures/django_views.py")),
        ("blog/serializers.py", include_str!("fixtures/django_serializers.py")),
    ])
}

/// Reader that counts how often each path is read.
#[derive(Default)]
struct CountingReader {
    reads: RefCell<BTreeMap<PathBuf, usize>>,
}

impl SourceReader for CountingReader {
    fn read(&self, path: &Path) -> String {
        *self.reads.borrow_mut().entry(path.to_path_buf()).or_default() += 1;
        FsSourceReader.read(path)
    }
}

#[test]
fn test_express_end_to_end() {
    let project = express_project();

    // Step 1: Detect framework
    let detection = FrameworkDetector::detect(project.path());
    assert_eq!(detection.frameworks, vec![Framework::Node]);

    // Step 2: Extract records
    let document = extract(project.path(), Framework::Node).expect("Extraction failed");

    let routes: Vec<(HttpMethod, &str)> = document
        .api_specs
        .iter()
        .map(|r| (r.method, r.endpoint.as_str()))
        .collect();
    assert_eq!(
        routes,
        vec![
            (HttpMethod::Get, "/posts"),
            (HttpMethod::Post, "/posts"),
            (HttpMethod::Get, "/posts/:id"),
            (HttpMethod::Delete, "/posts/:id"),
            (HttpMethod::Get, "/health"),
        ]
    );
    assert!(document.api_specs.iter().all(|r| r.source_file == "routes/posts.js"));

    let list = &document.api_specs[0];
    assert_eq!(list.controller_signature, "listPosts");
    assert_eq!(list.request_shape.query, vec!["limit", "page"]);
    assert!(!list.auth_required);

    let create = &document.api_specs[1];
    assert_eq!(create.middleware, vec!["protect"]);
    assert!(create.auth_required);
    assert_eq!(create.request_shape.body, vec!["body", "title"]);
    let statuses: Vec<&str> = create
        .response_shapes
        .iter()
        .map(|s| s.status_code.as_str())
        .collect();
    assert_eq!(statuses, vec!["201", "500"]);
    let primary = create.expected_response.as_ref().unwrap();
    assert_eq!(primary.status_code, "201");
    assert_eq!(primary.body, BodyDescriptor::object(["id", "title"]));

    let get = &document.api_specs[2];
    assert_eq!(get.request_shape.params, vec!["id"]);
    assert_eq!(get.response_shapes[0].status_code, "404");
    assert_eq!(get.expected_response.as_ref().unwrap().status_code, "200");

    // Step 3: Summary
    let summary = document.summary(3);
    assert_eq!(summary.routes, 5);
    assert_eq!(summary.unresolved_handlers, 1);
    assert_eq!(summary.auth_protected, 2);
}

#[test]
fn test_empty_directory_yields_no_records() {
    let project = TempDir::new().unwrap();

    let document = extract(project.path(), Framework::Node).unwrap();
    assert!(document.is_empty());

    let document = extract(project.path(), Framework::Django).unwrap();
    assert!(document.is_empty());
}

#[test]
fn test_directory_without_routes_yields_no_records() {
    let project = create_test_project(vec![
        ("lib/math.js", "module.exports = { add: (a, b) => a + b };\n"),
        ("README.md", "app.get('/not-code', handler);\n"),
    ]);

    assert_eq!(extract(project.path(), Framework::Node).unwrap(), ApiSpecDocument::default());
}

#[test]
fn test_invalid_root_is_an_error() {
    let project = TempDir::new().unwrap();
    let missing = project.path().join("missing");

    let err = extract(&missing, Framework::Node).unwrap_err();
    assert!(matches!(err, Error::InvalidRoot(ref path) if path == &missing));
}

#[test]
fn test_unsupported_tag_fails_before_traversal() {
    let project = TempDir::new().unwrap();
    let missing = project.path().join("missing");

    // The tag is rejected even though the root is unusable
    let err = extract_tagged(&missing, "rails").unwrap_err();
    assert!(matches!(err, Error::UnsupportedFramework(ref tag) if tag == "rails"));
    assert_eq!(
        err.to_string(),
        "Unsupported framework type 'rails'. Use 'nodejs' or 'django'."
    );
}

#[test]
fn test_tagged_extraction_accepts_aliases() {
    let project = express_project();

    let by_tag = extract_tagged(project.path(), "NODEJS").unwrap();
    let by_enum = extract(project.path(), Framework::Node).unwrap();
    assert_eq!(by_tag, by_enum);
}

#[test]
fn test_inline_handler_is_verbatim() {
    let project = express_project();
    let document = extract(project.path(), Framework::Node).unwrap();

    let health = document
        .api_specs
        .iter()
        .find(|r| r.endpoint == "/health")
        .unwrap();
    let inline = "(req, res) => {\n    res.json({ status: 'ok', uptime: process.uptime() });\n}";
    assert_eq!(health.controller_code, inline);
    assert_eq!(health.controller_signature, inline);
    assert_eq!(
        health.expected_response.as_ref().unwrap().body,
        BodyDescriptor::object(["status", "uptime"])
    );
}

#[test]
fn test_unresolved_symbol_keeps_empty_shapes() {
    let project = express_project();
    let document = extract(project.path(), Framework::Node).unwrap();

    let delete = &document.api_specs[3];
    assert_eq!(delete.controller_signature, "deletePost");
    assert_eq!(
        delete.controller_code,
        "Controller 'deletePost' not found in 'controllers/postController.js'."
    );
    assert!(!delete.is_resolved());
    assert!(delete.request_shape.is_empty());
    assert!(delete.response_shapes.is_empty());
    assert!(delete.expected_response.is_none());
    assert!(delete.auth_required);
}

#[test]
fn test_not_found_only_handler_primary() {
    let project = create_test_project(vec![(
        "app.js",
        r#"
const app = express();

app.get('/gone', (req, res) => {
    res.status(404).send('Not found');
});
"#,
    )]);

    let document = extract(project.path(), Framework::Node).unwrap();
    let primary = document.api_specs[0].expected_response.as_ref().unwrap();

    assert_eq!(primary.status_code, "404");
    assert_eq!(
        primary.body,
        BodyDescriptor::String {
            example: "Not found".to_string()
        }
    );

    let json = serde_json::to_value(primary).unwrap();
    assert_eq!(json["body"], serde_json::json!({ "type": "string", "example": "Not found" }));
}

#[test]
fn test_destructured_body_is_sorted_and_deduplicated() {
    let project = create_test_project(vec![(
        "app.js",
        r#"
const app = express();

app.put('/profile', (req, res) => {
    const { name, id } = req.body;
    const avatar = req.body.avatar;
    if (!req.body['name']) {
        return res.status(400).json({ error: 'name required' });
    }
    res.json({ id, name, avatar });
});
"#,
    )]);

    let document = extract(project.path(), Framework::Node).unwrap();
    assert_eq!(document.api_specs[0].request_shape.body, vec!["avatar", "id", "name"]);
}

#[test]
fn test_extraction_is_idempotent() {
    let project = express_project();

    let first = serialize_json(&extract(project.path(), Framework::Node).unwrap()).unwrap();
    let second = serialize_json(&extract(project.path(), Framework::Node).unwrap()).unwrap();
    assert_eq!(first, second);

    let django = django_project();
    let first = serialize_yaml(&extract(django.path(), Framework::Django).unwrap()).unwrap();
    let second = serialize_yaml(&extract(django.path(), Framework::Django).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_each_file_read_once() {
    let project = create_test_project(vec![
        ("app.js", "const app = express();\napp.get('/a', (req, res) => res.send('a'));\n"),
        ("routes/b.js", "router.get('/b', (req, res) => res.send('b'));\n"),
    ]);

    let reader = CountingReader::default();
    let document = extract_with_reader(project.path(), Framework::Node, &reader).unwrap();

    assert_eq!(document.len(), 2);
    let reads = reader.reads.borrow();
    assert_eq!(reads.len(), 2);
    assert!(reads.values().all(|count| *count == 1));
}

#[cfg(unix)]
#[test]
fn test_symlinked_directory_processed_once() {
    let project = create_test_project(vec![(
        "routes/users.js",
        "router.get('/users', (req, res) => res.json([]));\n",
    )]);
    std::os::unix::fs::symlink(project.path().join("routes"), project.path().join("alias"))
        .expect("Failed to create symlink");

    let reader = CountingReader::default();
    let document = extract_with_reader(project.path(), Framework::Node, &reader).unwrap();

    assert_eq!(document.len(), 1);
    let reads = reader.reads.borrow();
    assert_eq!(reads.len(), 1);
    assert!(reads.values().all(|count| *count == 1));
}

#[test]
fn test_django_end_to_end() {
    let project = django_project();

    let detection = FrameworkDetector::detect(project.path());
    assert_eq!(detection.frameworks, vec![Framework::Django]);

    let document = extract(project.path(), Framework::Django).unwrap();
    let routes: Vec<(HttpMethod, &str, &str)> = document
        .api_specs
        .iter()
        .map(|r| (r.method, r.endpoint.as_str(), r.controller_signature.as_str()))
        .collect();
    assert_eq!(
        routes,
        vec![
            (HttpMethod::Get, "articles/", "views.article_list"),
            (HttpMethod::Post, "articles/", "views.article_list"),
            (HttpMethod::Get, "articles/<slug:slug>/", "ArticleDetail.get"),
            (HttpMethod::Put, "articles/<slug:slug>/", "ArticleDetail.put"),
        ]
    );
    assert!(document.api_specs.iter().all(|r| r.source_file == "blog/urls.py"));

    let create = &document.api_specs[1];
    assert_eq!(create.middleware, vec!["login_required"]);
    assert!(create.auth_required);
    assert_eq!(create.request_shape.body, vec!["body", "published", "title"]);
    assert_eq!(create.request_shape.query, vec!["tag"]);
    let primary = create.expected_response.as_ref().unwrap();
    assert_eq!(primary.status_code, "201");
    assert_eq!(primary.body, BodyDescriptor::object(["body", "published", "title"]));

    let update = &document.api_specs[3];
    assert!(!update.auth_required);
    assert_eq!(update.request_shape.params, vec!["slug"]);
    assert_eq!(update.request_shape.body, vec!["title"]);
    assert_eq!(update.expected_response.as_ref().unwrap().status_code, "200");
}

#[test]
fn test_mixed_repository_extracts_both_families() {
    let project = create_test_project(vec![
        ("manage.py", "import django\n"),
        ("blog/urls.py", include_str!("fixtures/django_urls.py")),
        ("blog/views.py", include_str!("fixtures/django_views.py")),
        (
            "frontend/server.js",
            "const express = require('express');\nconst app = express();\napp.get('/', (req, res) => res.send('hi'));\n",
        ),
    ]);

    let detection = FrameworkDetector::detect(project.path());
    let extraction = extract_all(project.path(), &detection.frameworks, &FsSourceReader).unwrap();

    assert_eq!(extraction.document.len(), 5);
    assert_eq!(extraction.document.api_specs[0].source_file, "frontend/server.js");
    assert_eq!(extraction.document.api_specs[1].source_file, "blog/urls.py");
    assert_eq!(extraction.files_processed, 4);
}
