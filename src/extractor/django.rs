use crate::auth;
use crate::detector::Framework;
use crate::extractor::{ExtractionContext, FrameworkAdapter};
use crate::lexer::{self, Syntax};
use crate::record::{HttpMethod, SpecificationRecord};
use crate::request::{RequestCategory, RequestPatterns};
use crate::resolver::Resolution;
use crate::response::{self, BodyDescriptor, StructureAnalyzer};
use crate::source::SourceFile;
use log::{debug, warn};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

const EXTENSIONS: &[&str] = &["py"];
const SKIP_DIRS: &[&str] = &["__pycache__", "venv", "env"];
const VIEW_METHODS: &[&str] = &["get", "post", "put", "patch", "delete", "options", "head"];

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\w.])(?:re_path|path|url)\s*\(").expect("url pattern is valid")
});

static VIEW_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^([A-Za-z_][\w.]*?)\s*(?:\.\s*as_view\s*\(.*\))?$")
        .expect("view reference pattern is valid")
});

static PATH_CONVERTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?:\w+:)?(\w+)>").expect("converter pattern is valid"));

static FUNCTION_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([ \t]*)(?:async\s+)?def\s+(\w+)\s*\(([^)]*)\)\s*(?:->[^:\n]*)?:")
        .expect("def pattern is valid")
});

static CLASS_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^class\s+(\w+)\s*(?:\(([^)]*)\))?\s*:").expect("class pattern is valid")
});

static SERIALIZER_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]+(\w+)\s*=\s*serializers\.\w+\s*\(").expect("field pattern is valid")
});

static META_FIELDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bfields\s*=\s*[\[(]([^\])]*)[\])]").expect("meta fields pattern is valid")
});

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"]([^'"]+)['"]"#).expect("quoted pattern is valid"));

static SERIALIZER_BINDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\w+)\s*=\s*(\w+Serializer)\s*\(").expect("serializer binding pattern is valid")
});

static SERIALIZER_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\w+Serializer)\s*\([^)]*\bdata\s*=").expect("serializer input pattern is valid")
});

static CLASS_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]+(?:permission|authentication)_classes\s*=\s*(.+?)\s*$")
        .expect("class attribute pattern is valid")
});

/// Django / Django REST framework adapter.
///
/// Routes come from `urlpatterns` entries in `urls.py` files; each entry names a
/// view that is looked up by name across every view module in the tree (`views.py`
/// or any module under a `views/` package).
///
/// ```text
/// path('users/', views.user_list, name='user-list'),
/// path('users/<int:pk>/', views.UserDetail.as_view()),
/// ```
///
/// Function views take their methods from `@api_view([...])` or
/// `@require_http_methods([...])` (GET otherwise); class-based views yield one route
/// per HTTP method they define.
#[derive(Debug, Default, Clone, Copy)]
pub struct DjangoAdapter;

/// One callable handling a URL pattern for some methods.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ViewHandler {
    methods: Vec<HttpMethod>,
    /// Method name for class-based views
    method_name: Option<String>,
    code: String,
    /// Parameters after `self`, the request first
    params: Vec<String>,
    middleware: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ViewDefinition {
    name: String,
    handlers: Vec<ViewHandler>,
}

/// An entry of `urlpatterns`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct UrlPattern {
    endpoint: String,
    /// View expression as written, e.g. `views.UserDetail.as_view()`
    view: String,
    /// Name the view is defined under, e.g. `UserDetail`
    view_name: String,
}

impl FrameworkAdapter for DjangoAdapter {
    fn framework(&self) -> Framework {
        Framework::Django
    }

    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn skip_dirs(&self) -> &'static [&'static str] {
        SKIP_DIRS
    }

    fn extract_routes(
        &self,
        files: &[SourceFile],
        ctx: &ExtractionContext,
    ) -> Vec<SpecificationRecord> {
        let view_files: Vec<&SourceFile> = files.iter().filter(|f| is_view_module(&f.path)).collect();

        let mut views: BTreeMap<String, ViewDefinition> = BTreeMap::new();
        for file in &view_files {
            for view in parse_views(&file.content) {
                // First definition in traversal order wins
                views.entry(view.name.clone()).or_insert(view);
            }
        }

        let mut serializers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for file in files {
            for (name, fields) in parse_serializers(&file.content) {
                serializers.entry(name).or_insert(fields);
            }
        }
        debug!(
            "Indexed {} views in {} view modules and {} serializers",
            views.len(),
            view_files.len(),
            serializers.len()
        );

        let mut records = Vec::new();
        for file in files.iter().filter(|f| f.file_name() == "urls.py") {
            let patterns = parse_urlpatterns(&file.content);
            debug!("Found {} URL patterns in {}", patterns.len(), file.relative_path);

            for pattern in patterns {
                match views.get(&pattern.view_name) {
                    Some(view) => records.extend(view_records(&pattern, view, file, &serializers)),
                    None => {
                        let resolution = missing_view(&pattern, file, &view_files, ctx.root);
                        warn!("{}", resolution);
                        let mut record = SpecificationRecord::new(
                            pattern.endpoint,
                            HttpMethod::Get,
                            file.relative_path.clone(),
                        );
                        record.controller_signature = pattern.view;
                        record.controller_code = resolution.into_code();
                        records.push(record);
                    }
                }
            }
        }

        records
    }
}

fn is_view_module(path: &Path) -> bool {
    let file_name = path.file_name().and_then(|n| n.to_str());
    let parent = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str());
    file_name == Some("views.py") || parent == Some("views")
}

/// Entries of `urlpatterns` in source order; `include(...)` entries are skipped.
fn parse_urlpatterns(content: &str) -> Vec<UrlPattern> {
    let masked = lexer::mask_comments(content, Syntax::Python);
    let mut patterns = Vec::new();

    for found in URL_PATTERN.find_iter(&masked) {
        let open = found.end() - 1;
        let Some(close) = lexer::find_closing(&masked, open, Syntax::Python) else {
            continue;
        };
        let args = lexer::split_arguments(content, &masked, open, close, Syntax::Python);
        let [route, view, ..] = args.as_slice() else {
            continue;
        };

        let Some(endpoint) = lexer::string_literal_value(route.trim_start_matches(['r', 'u']))
        else {
            continue;
        };
        if view.starts_with("include") {
            debug!("Skipping included URLconf at '{}'", endpoint);
            continue;
        }
        let Some(reference) = VIEW_REFERENCE.captures(view) else {
            continue;
        };
        let view_name = reference[1].rsplit('.').next().unwrap_or_default().to_string();

        patterns.push(UrlPattern {
            endpoint: endpoint.to_string(),
            view: view.to_string(),
            view_name,
        });
    }

    patterns
}

/// Top-level function and class-based views defined in a module.
fn parse_views(content: &str) -> Vec<ViewDefinition> {
    let mut views = Vec::new();

    for caps in FUNCTION_DEF.captures_iter(content) {
        let (Some(header), Some(indent)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if !indent.as_str().is_empty() {
            continue;
        }

        let (start, decorators) = decorators_above(content, header.start(), 0);
        let end = block_end(content, header.end(), 0);

        let mut methods = Vec::new();
        let mut middleware = Vec::new();
        for decorator in decorators {
            match decorator_methods(&decorator) {
                Some(declared) => methods.extend(declared),
                None => middleware.push(decorator),
            }
        }
        if methods.is_empty() {
            methods.push(HttpMethod::Get);
        }

        views.push(ViewDefinition {
            name: caps[2].to_string(),
            handlers: vec![ViewHandler {
                methods,
                method_name: None,
                code: content[start..end].trim_end().to_string(),
                params: parse_params(&caps[3]),
                middleware,
            }],
        });
    }

    for caps in CLASS_DEF.captures_iter(content) {
        let Some(header) = caps.get(0) else { continue };
        let (_, class_decorators) = decorators_above(content, header.start(), 0);
        let end = block_end(content, header.end(), 0);
        let body = &content[header.end()..end];

        let mut class_middleware = class_decorators;
        for attr in CLASS_ATTRIBUTE.captures_iter(body) {
            class_middleware.extend(class_attribute_entries(&attr[1]));
        }

        let handlers = class_view_handlers(body, &class_middleware);
        if !handlers.is_empty() {
            views.push(ViewDefinition {
                name: caps[1].to_string(),
                handlers,
            });
        }
    }

    views
}

/// Classes listed by a `permission_classes` / `authentication_classes` value.
///
/// `[IsAuthenticated, IsAdminUser]` gives both names, `[]` and `()` give none, and
/// anything other than a literal list or tuple is kept as written.
fn class_attribute_entries(value: &str) -> Vec<String> {
    let value = value.trim();
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .or_else(|| value.strip_prefix('(').and_then(|v| v.strip_suffix(')')));

    match inner {
        Some(inner) => lexer::split_top_level(inner, b',', Syntax::Python)
            .into_iter()
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect(),
        None => vec![value.to_string()],
    }
}

/// HTTP method handlers (`def get(self, request)`, ...) directly inside a class body.
fn class_view_handlers(body: &str, class_middleware: &[String]) -> Vec<ViewHandler> {
    let defs: Vec<_> = FUNCTION_DEF.captures_iter(body).collect();
    let Some(method_indent) = defs
        .iter()
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().len())
        .filter(|&len| len > 0)
        .min()
    else {
        return Vec::new();
    };

    let mut handlers = Vec::new();
    for caps in &defs {
        let (Some(header), Some(indent)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let name = caps[2].to_lowercase();
        if indent.as_str().len() != method_indent || !VIEW_METHODS.contains(&name.as_str()) {
            continue;
        }
        let Some(method) = HttpMethod::parse(&name) else {
            continue;
        };

        let (start, decorators) = decorators_above(body, header.start(), method_indent);
        let end = block_end(body, header.end(), method_indent);

        let mut middleware = class_middleware.to_vec();
        middleware.extend(decorators);

        handlers.push(ViewHandler {
            methods: vec![method],
            method_name: Some(name),
            code: dedent(body[start..end].trim_end(), method_indent),
            params: parse_params(&caps[3]),
            middleware,
        });
    }
    handlers
}

/// Methods declared by a routing decorator, or `None` for any other decorator.
fn decorator_methods(decorator: &str) -> Option<Vec<HttpMethod>> {
    let name = decorator.split('(').next().unwrap_or_default().trim();
    let name = name.rsplit('.').next().unwrap_or(name);
    match name {
        "api_view" | "require_http_methods" => Some(
            QUOTED
                .captures_iter(decorator)
                .filter_map(|caps| HttpMethod::parse(&caps[1]))
                .collect(),
        ),
        "require_GET" | "require_safe" => Some(vec![HttpMethod::Get]),
        "require_POST" => Some(vec![HttpMethod::Post]),
        _ => None,
    }
}

/// Serializer classes and their field names, declared fields first then `Meta.fields`.
fn parse_serializers(content: &str) -> Vec<(String, Vec<String>)> {
    let mut serializers = Vec::new();

    for caps in CLASS_DEF.captures_iter(content) {
        let Some(header) = caps.get(0) else { continue };
        let is_serializer = caps.get(2).is_some_and(|bases| bases.as_str().contains("Serializer"));
        if !is_serializer {
            continue;
        }

        let body = &content[header.end()..block_end(content, header.end(), 0)];
        let mut fields: Vec<String> = SERIALIZER_FIELD
            .captures_iter(body)
            .map(|field| field[1].to_string())
            .collect();
        for meta in META_FIELDS.captures_iter(body) {
            for name in QUOTED.captures_iter(&meta[1]) {
                if !fields.iter().any(|f| f == &name[1]) {
                    fields.push(name[1].to_string());
                }
            }
        }

        serializers.push((caps[1].to_string(), fields));
    }

    serializers
}

fn view_records(
    pattern: &UrlPattern,
    view: &ViewDefinition,
    urls_file: &SourceFile,
    serializers: &BTreeMap<String, Vec<String>>,
) -> Vec<SpecificationRecord> {
    let mut records = Vec::new();

    for handler in &view.handlers {
        let signature = match &handler.method_name {
            Some(method_name) => format!("{}.{}", view.name, method_name),
            None => pattern.view.clone(),
        };

        for &method in &handler.methods {
            let mut record = SpecificationRecord::new(
                pattern.endpoint.clone(),
                method,
                urls_file.relative_path.clone(),
            );
            record.controller_signature = signature.clone();
            record.controller_code = handler.code.clone();
            record.middleware = handler.middleware.clone();
            record.auth_required = auth::requires_auth(&record.middleware);
            analyze_view(&pattern.endpoint, handler, serializers, &mut record);
            records.push(record);
        }
    }

    records
}

fn analyze_view(
    endpoint: &str,
    handler: &ViewHandler,
    serializers: &BTreeMap<String, Vec<String>>,
    record: &mut SpecificationRecord,
) {
    let code = &handler.code;
    let request = handler.params.first().map_or("request", String::as_str);

    let mut shape = RequestPatterns::python(request).extract(code);
    shape.extend(
        RequestCategory::Params,
        PATH_CONVERTER
            .captures_iter(endpoint)
            .map(|caps| caps[1].to_string()),
    );
    shape.extend(RequestCategory::Params, handler.params.iter().skip(1).cloned());
    for caps in SERIALIZER_INPUT.captures_iter(code) {
        if let Some(fields) = serializers.get(&caps[1]) {
            shape.extend(RequestCategory::Body, fields.iter().cloned());
        }
    }
    record.request_shape = shape;

    let mut analyzer = StructureAnalyzer::new(code, Syntax::Python);
    for caps in SERIALIZER_BINDING.captures_iter(code) {
        if let Some(fields) = serializers.get(&caps[2]) {
            analyzer = analyzer.with_hint(
                &format!("{}.data", &caps[1]),
                BodyDescriptor::object(fields.iter().cloned()),
            );
        }
    }

    let calls = response::find_python_responses(code);
    record.response_shapes = analyzer.analyze_calls(&calls);
    record.expected_response = response::select_primary(&record.response_shapes);
}

/// Diagnostic for a URL pattern whose view is defined nowhere in the tree.
fn missing_view(
    pattern: &UrlPattern,
    urls_file: &SourceFile,
    view_files: &[&SourceFile],
    root: &Path,
) -> Resolution {
    let sibling = urls_file.path.with_file_name("views.py");
    let sibling_display = crate::source::relative_display(root, &sibling);

    let file = view_files
        .iter()
        .find(|f| f.path == sibling)
        .or_else(|| view_files.first())
        .map(|f| f.relative_path.clone());

    match file {
        Some(file) => Resolution::SymbolNotFound {
            name: pattern.view_name.clone(),
            file,
        },
        None => Resolution::FileNotFound {
            attempted: sibling_display,
        },
    }
}

/// Parameter names of a `def`, without `self`/`cls`, annotations, defaults or `*args`.
fn parse_params(params: &str) -> Vec<String> {
    lexer::split_top_level(params, b',', Syntax::Python)
        .into_iter()
        .filter(|p| !p.starts_with('*') && *p != "/")
        .filter_map(|p| {
            let name = p.split([':', '=']).next()?.trim();
            (!name.is_empty() && name != "self" && name != "cls").then(|| name.to_string())
        })
        .collect()
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

/// Decorator lines directly above the header starting at `header_start`, and the
/// offset of the first of them.
fn decorators_above(content: &str, header_start: usize, indent: usize) -> (usize, Vec<String>) {
    let mut start = header_start;
    let mut decorators = Vec::new();

    while start > 0 {
        let line_end = start - 1;
        let line_start = content[..line_end].rfind('\n').map_or(0, |p| p + 1);
        let line = &content[line_start..line_end];
        let trimmed = line.trim();
        if !trimmed.starts_with('@') || indent_of(line) != indent {
            break;
        }
        decorators.push(trimmed[1..].trim().to_string());
        start = line_start;
    }

    decorators.reverse();
    (start, decorators)
}

/// End offset of the indented block whose header ends at `header_end`.
///
/// The block runs until the first non-blank, non-comment line indented no deeper
/// than `indent`.
fn block_end(content: &str, header_end: usize, indent: usize) -> usize {
    let Some(newline) = content[header_end..].find('\n') else {
        return content.len();
    };
    let mut offset = header_end + newline + 1;
    let mut end = offset;

    for line in content[offset..].split_inclusive('\n') {
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with('#') && indent_of(line) <= indent {
            break;
        }
        offset += line.len();
        if !trimmed.is_empty() {
            end = offset;
        }
    }

    end
}

/// Removes `width` columns of leading indentation from every line that has them.
fn dedent(block: &str, width: usize) -> String {
    block
        .lines()
        .map(|line| {
            if indent_of(line) >= width {
                &line[width..]
            } else {
                line.trim_start()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
