use crate::auth;
use crate::detector::Framework;
use crate::extractor::{ExtractionContext, FrameworkAdapter};
use crate::imports::ImportBinding;
use crate::lexer::{self, Syntax};
use crate::record::{HttpMethod, SpecificationRecord};
use crate::request::{RequestPatterns, RequestShape};
use crate::resolver::{ReferenceResolver, Resolution};
use crate::response::{self, StructureAnalyzer};
use crate::source::SourceFile;
use log::debug;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

const EXTENSIONS: &[&str] = &["js", "mjs", "cjs"];
const SKIP_DIRS: &[&str] = &["node_modules"];
const DEFAULT_RECEIVERS: &[&str] = &["app", "router"];
const ROUTE_METHODS: &str = "get|post|put|patch|delete|options|head";

static ROUTER_BINDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:express\s*\(\s*\)|(?:express\s*\.\s*)?Router\s*\()",
    )
    .expect("router binding pattern is valid")
});

static CHAINED_ROUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\s*\.\s*({ROUTE_METHODS})\s*\("))
        .expect("chained route pattern is valid")
});

static HANDLER_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][\w$]*(?:\s*\.\s*[A-Za-z_$][\w$]*)*$")
        .expect("handler reference pattern is valid")
});

static SINGLE_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\w$])([A-Za-z_$][\w$]*)\s*=>").expect("single param pattern is valid")
});

/// Express adapter.
///
/// Routes are calls on a routing object: `app`, `router`, or any variable bound
/// to `express()` / `express.Router()` / `Router()` in the same file.
///
/// ```text
/// router.get('/users/:id', authenticate, getUser);
/// router.route('/posts').get(listPosts).post(protect, createPost);
/// app.use(cors());
/// ```
///
/// Every argument between the path and the last one is route-level middleware. The
/// last argument is the handler: a plain or dotted name is resolved through the
/// file's imports, anything else is an inline handler used verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeAdapter;

/// A route declaration found in a file, before its handler is analysed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RouteDeclaration {
    method: HttpMethod,
    endpoint: String,
    /// Route-level middleware expressions, in argument order
    middleware: Vec<String>,
    handler: String,
}

impl FrameworkAdapter for NodeAdapter {
    fn framework(&self) -> Framework {
        Framework::Node
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
        let resolver = ReferenceResolver::new(ctx.root, EXTENSIONS, ctx.reader);
        let mut records = Vec::new();

        for file in files {
            let file_records = self.process_file(file, &resolver);
            if !file_records.is_empty() {
                debug!(
                    "Found {} routes in {}",
                    file_records.len(),
                    file.relative_path
                );
            }
            records.extend(file_records);
        }

        records
    }
}

impl NodeAdapter {
    fn process_file(
        &self,
        file: &SourceFile,
        resolver: &ReferenceResolver,
    ) -> Vec<SpecificationRecord> {
        let masked = lexer::mask_comments(&file.content, Syntax::JavaScript);
        let receivers = routing_receivers(&masked);
        let (declarations, file_middleware) = scan_routes(&file.content, &masked, &receivers);
        if declarations.is_empty() {
            return Vec::new();
        }

        let imports = ImportBinding::parse(&masked);

        declarations
            .into_iter()
            .map(|declaration| {
                let mut record = SpecificationRecord::new(
                    declaration.endpoint,
                    declaration.method,
                    file.relative_path.clone(),
                );
                record.middleware = file_middleware
                    .iter()
                    .chain(&declaration.middleware)
                    .cloned()
                    .collect();
                record.auth_required = auth::requires_auth(&record.middleware);

                let resolution = resolve_handler(&declaration.handler, &imports, file, resolver);
                record.controller_signature = declaration.handler;
                if resolution.is_resolved() {
                    let code = resolution.into_code();
                    analyze_handler(&code, &mut record);
                    record.controller_code = code;
                } else {
                    record.controller_code = resolution.into_code();
                }
                record
            })
            .collect()
    }
}

/// Names of routing objects in a file: the conventional ones plus any local binding.
fn routing_receivers(masked: &str) -> Vec<String> {
    let mut receivers: BTreeSet<String> = DEFAULT_RECEIVERS.iter().map(|r| r.to_string()).collect();
    receivers.extend(
        ROUTER_BINDING
            .captures_iter(masked)
            .map(|caps| caps[1].to_string()),
    );
    receivers.into_iter().collect()
}

/// Finds route declarations and file-level `use` middleware, in source order.
///
/// Offsets are taken from `masked` (comments blanked) and sliced from `content`, so
/// commented-out routes are ignored while snippets keep their comments.
fn scan_routes(
    content: &str,
    masked: &str,
    receivers: &[String],
) -> (Vec<RouteDeclaration>, Vec<String>) {
    let mut declarations = Vec::new();
    let mut middleware = Vec::new();

    let alternation = receivers
        .iter()
        .map(|r| regex::escape(r))
        .collect::<Vec<_>>()
        .join("|");
    let Ok(route_call) = Regex::new(&format!(
        r"(?:^|[^\w$.])(?:{alternation})\s*\.\s*({ROUTE_METHODS}|use|route)\s*\("
    )) else {
        return (declarations, middleware);
    };

    for caps in route_call.captures_iter(masked) {
        let (Some(call), Some(verb)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let open = call.end() - 1;
        let Some(close) = lexer::find_closing(masked, open, Syntax::JavaScript) else {
            continue;
        };
        let args = lexer::split_arguments(content, masked, open, close, Syntax::JavaScript);

        match verb.as_str() {
            "use" => {
                let inner = content[open + 1..close].trim();
                if !inner.is_empty() {
                    middleware.push(inner.to_string());
                }
            }
            "route" => {
                let Some(endpoint) = args.first().and_then(|a| lexer::string_literal_value(a))
                else {
                    continue;
                };
                declarations.extend(scan_route_chain(content, masked, close + 1, endpoint));
            }
            method => {
                let Some(method) = HttpMethod::parse(method) else {
                    continue;
                };
                if let Some(declaration) = route_declaration(method, &args) {
                    declarations.push(declaration);
                }
            }
        }
    }

    (declarations, middleware)
}

/// Declarations chained onto `router.route(path)`, starting just after its `)`.
fn scan_route_chain(
    content: &str,
    masked: &str,
    mut pos: usize,
    endpoint: &str,
) -> Vec<RouteDeclaration> {
    let mut declarations = Vec::new();

    while let Some(caps) = CHAINED_ROUTE.captures(&masked[pos..]) {
        let (Some(call), Some(verb)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let open = pos + call.end() - 1;
        let Some(close) = lexer::find_closing(masked, open, Syntax::JavaScript) else {
            break;
        };
        let handlers = lexer::split_arguments(content, masked, open, close, Syntax::JavaScript);

        if let (Some(method), Some((handler, middleware))) =
            (HttpMethod::parse(verb.as_str()), handlers.split_last())
        {
            declarations.push(RouteDeclaration {
                method,
                endpoint: endpoint.to_string(),
                middleware: middleware.iter().map(|m| m.to_string()).collect(),
                handler: handler.to_string(),
            });
        }
        pos = close + 1;
    }

    declarations
}

fn route_declaration(method: HttpMethod, args: &[&str]) -> Option<RouteDeclaration> {
    let [path, rest @ ..] = args else {
        return None;
    };
    let endpoint = lexer::string_literal_value(path)?;
    // `app.get('env')` reads a setting
    let (handler, middleware) = rest.split_last()?;

    Some(RouteDeclaration {
        method,
        endpoint: endpoint.to_string(),
        middleware: middleware.iter().map(|m| m.to_string()).collect(),
        handler: handler.to_string(),
    })
}

/// Materialises the handler source for a route's last argument.
fn resolve_handler(
    handler: &str,
    imports: &ImportBinding,
    file: &SourceFile,
    resolver: &ReferenceResolver,
) -> Resolution {
    if !HANDLER_REFERENCE.is_match(handler) {
        return Resolution::Resolved(handler.trim().to_string());
    }

    let name = handler.rsplit('.').next().unwrap_or(handler).trim();
    match imports.get(name) {
        Some(symbol) => resolver.resolve(symbol, &file.path),
        None => {
            debug!("'{}' is not imported, searching {}", name, file.relative_path);
            resolver.resolve_local(name, file)
        }
    }
}

/// Fills the request and response shapes from resolved handler code.
fn analyze_handler(code: &str, record: &mut SpecificationRecord) {
    let params = handler_params(code);
    let req = params.first().map_or("req", String::as_str);
    let res = params.get(1).map_or("res", String::as_str);

    record.request_shape = extract_request(code, req);

    let calls = response::find_js_responses(code, res);
    let analyzer = StructureAnalyzer::new(code, Syntax::JavaScript);
    record.response_shapes = analyzer.analyze_calls(&calls);
    record.expected_response = response::select_primary(&record.response_shapes);
}

fn extract_request(code: &str, req: &str) -> RequestShape {
    RequestPatterns::javascript(req).extract(code)
}

/// Parameter names of the handler, when they are plain identifiers.
fn handler_params(code: &str) -> Vec<String> {
    let head_end = code.find('{').unwrap_or(code.len());
    let head = &code[..head_end];

    let params = match head.find('(') {
        Some(open) => match lexer::find_closing(code, open, Syntax::JavaScript) {
            Some(close) => lexer::split_top_level(&code[open + 1..close], b',', Syntax::JavaScript)
                .into_iter()
                .map(|p| p.split('=').next().unwrap_or_default().trim().to_string())
                .collect(),
            None => Vec::new(),
        },
        None => SINGLE_PARAM
            .captures(head)
            .map(|caps| vec![caps[1].to_string()])
            .unwrap_or_default(),
    };

    params
        .into_iter()
        .take_while(|p| lexer::is_identifier(p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::BodyDescriptor;
    use crate::source::FsSourceReader;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn extract(root: &Path, relatives: &[&str]) -> Vec<SpecificationRecord> {
        let files: Vec<SourceFile> = relatives
            .iter()
            .map(|r| SourceFile::load(&FsSourceReader, root, &root.join(r)))
            .collect();
        NodeAdapter.extract_routes(&files, &ExtractionContext::new(root, &FsSourceReader))
    }

    #[test]
    fn test_scan_routes_with_middleware() {
        let content = r#"
const router = express.Router();
router.use(logger);
router.get('/users', listUsers);
router.post("/users", authenticate, validate(schema), createUser);
// router.delete('/users/:id', removeUser);
app.get('env');
"#;
        let masked = lexer::mask_comments(content, Syntax::JavaScript);
        let receivers = routing_receivers(&masked);
        let (routes, middleware) = scan_routes(content, &masked, &receivers);

        assert_eq!(middleware, vec!["logger"]);
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].method, HttpMethod::Get);
        assert_eq!(routes[0].endpoint, "/users");
        assert_eq!(routes[0].handler, "listUsers");
        assert_eq!(routes[1].method, HttpMethod::Post);
        assert_eq!(routes[1].middleware, vec!["authenticate", "validate(schema)"]);
        assert_eq!(routes[1].handler, "createUser");
    }

    #[test]
    fn test_custom_router_variable_and_chain() {
        let content = r#"
const { Router } = require('express');
const posts = Router();
posts.route('/posts/:id')
    .get(getPost)
    .put(protect, updatePost);
api.get('/ignored', handler);
"#;
        let masked = lexer::mask_comments(content, Syntax::JavaScript);
        let receivers = routing_receivers(&masked);
        let (routes, _) = scan_routes(content, &masked, &receivers);

        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].endpoint, "/posts/:id");
        assert_eq!(routes[0].method, HttpMethod::Get);
        assert_eq!(routes[1].method, HttpMethod::Put);
        assert_eq!(routes[1].middleware, vec!["protect"]);
        assert_eq!(routes[1].handler, "updatePost");
    }

    #[test]
    fn test_handler_params() {
        assert_eq!(handler_params("async (request, response) => {}"), vec!["request", "response"]);
        assert_eq!(handler_params("const h = async (req, res, next) => {}"), vec!["req", "res", "next"]);
        assert_eq!(handler_params("function (rq, rs) { }"), vec!["rq", "rs"]);
        assert_eq!(handler_params("req => { }"), vec!["req"]);
        assert!(handler_params("({ body }, res) => {}").is_empty());
    }

    #[test]
    fn test_inline_handler_used_verbatim() {
        let dir = TempDir::new().unwrap();
        let inline = "(req, res) => {\n    res.status(200).json({ ok: true });\n}";
        write(
            dir.path(),
            "app.js",
            &format!("const app = express();\napp.get('/health', {});\n", inline),
        );

        let records = extract(dir.path(), &["app.js"]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].controller_signature, inline);
        assert_eq!(records[0].controller_code, inline);
        assert_eq!(records[0].source_file, "app.js");
        assert_eq!(
            records[0].expected_response.as_ref().unwrap().body,
            BodyDescriptor::object(["ok"])
        );
    }

    #[test]
    fn test_imported_handler_is_resolved_and_analyzed() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "routes/users.js",
            r#"
const express = require('express');
const { createUser } = require('../controllers/userController');
const { protect } = require('../middleware/auth');
const router = express.Router();

router.post('/users', protect, createUser);

module.exports = router;
"#,
        );
        write(
            dir.path(),
            "controllers/userController.js",
            r#"
const createUser = async (req, res) => {
    const { name, email } = req.body;
    try {
        const user = await User.create({ name, email });
        res.status(201).json({ id: user.id, name });
    } catch (err) {
        res.status(500).json({ message: err.message });
    }
};

module.exports = { createUser };
"#,
        );

        let records = extract(dir.path(), &["controllers/userController.js", "routes/users.js"]);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.endpoint, "/users");
        assert_eq!(record.method, HttpMethod::Post);
        assert_eq!(record.source_file, "routes/users.js");
        assert_eq!(record.controller_signature, "createUser");
        assert!(record.controller_code.starts_with("const createUser = async (req, res) => {"));
        assert_eq!(record.middleware, vec!["protect"]);
        assert!(record.auth_required);
        assert_eq!(record.request_shape.body, vec!["email", "name"]);
        assert_eq!(record.response_shapes.len(), 2);
        assert_eq!(record.expected_response.as_ref().unwrap().status_code, "201");
    }

    #[test]
    fn test_missing_controller_file_leaves_shapes_empty() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "routes/items.js",
            "const { getItem } = require('../controllers/items');\nrouter.get('/items/:id', getItem);\n",
        );

        let records = extract(dir.path(), &["routes/items.js"]);

        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].controller_code,
            "Controller file 'controllers/items.js' not found."
        );
        assert!(!records[0].is_resolved());
        assert!(records[0].request_shape.is_empty());
        assert!(records[0].response_shapes.is_empty());
        assert!(records[0].expected_response.is_none());
    }

    #[test]
    fn test_local_and_dotted_handlers() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "server.js",
            r#"
const app = express();

function ping(req, res) {
    res.send('pong');
}

app.get('/ping', ping);
app.get('/users', userController.list);
"#,
        );

        let records = extract(dir.path(), &["server.js"]);

        assert_eq!(records.len(), 2);
        assert!(records[0].controller_code.starts_with("function ping(req, res) {"));
        assert_eq!(
            records[0].expected_response.as_ref().unwrap().body,
            BodyDescriptor::String {
                example: "pong".to_string()
            }
        );
        assert_eq!(records[1].controller_signature, "userController.list");
        assert_eq!(
            records[1].controller_code,
            "Controller 'list' not found in 'server.js'."
        );
    }

    #[test]
    fn test_file_without_routes() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "util.js", "module.exports = { add: (a, b) => a + b };\n");

        assert!(extract(dir.path(), &["util.js"]).is_empty());
    }
}
