//! Response shape inference.
//!
//! Response calls are found by dialect-specific matchers that yield
//! [`ResponseCall`]s; the [`StructureAnalyzer`] then classifies each payload
//! expression into a [`BodyDescriptor`]. Classification always terminates: an
//! identifier is followed through at most one assignment.

use crate::lexer::{self, Syntax};
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Status code assumed when a response call does not state one.
pub const DEFAULT_STATUS: &str = "200";

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(?:\.\d+)?$").expect("number pattern is valid"));

static ERROR_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:err|errors?|exception)\b|Error\b").expect("error pattern is valid")
});

static PYTHON_RESPONSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\w.])(?:Response|JsonResponse|HttpResponse)\s*\(")
        .expect("response pattern is valid")
});

static KEYWORD_ARGUMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^([A-Za-z_]\w*)\s*=([^=].*)$").expect("keyword pattern is valid")
});

/// `404`, `status.HTTP_404_NOT_FOUND` or `HTTP_404_NOT_FOUND`
static PYTHON_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:\w+\.)?HTTP_)?(\d{3})(?:\D|$)").expect("status pattern is valid")
});

/// Inferred structure of a response payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BodyDescriptor {
    String { example: String },
    Number { example: f64 },
    Boolean { example: bool },
    /// Object literal; property types cannot be recovered from source and are `unknown`
    Object { properties: BTreeMap<String, String> },
    /// An identifier whose assignment could not be found
    Variable { variable: String },
    Error { properties: BTreeMap<String, String> },
    Unknown { raw: String },
}

impl BodyDescriptor {
    /// Object descriptor with every property typed `unknown`.
    pub fn object<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BodyDescriptor::Object {
            properties: keys
                .into_iter()
                .map(|k| (k.into(), "unknown".to_string()))
                .collect(),
        }
    }

    fn error() -> Self {
        BodyDescriptor::Error {
            properties: BTreeMap::from([
                ("message".to_string(), "string".to_string()),
                ("stack".to_string(), "string".to_string()),
            ]),
        }
    }
}

/// One matched response in a handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseShape {
    /// Three-digit status code
    pub status_code: String,
    /// Payload expression with whitespace normalised
    pub response_body: String,
    pub body: BodyDescriptor,
}

impl ResponseShape {
    pub fn is_success(&self) -> bool {
        self.status_code.starts_with('2')
    }
}

/// A response call located in handler source, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCall {
    /// Byte offset of the call in the handler text
    pub offset: usize,
    pub status_code: String,
    /// Raw payload expression; empty when the call sends no body
    pub payload: String,
}

/// Finds Express-style response calls on the response object named `res`.
///
/// Recognised forms, in source order:
///
/// ```text
/// res.json(payload)              res.send(payload)          // 200
/// res.status(404).send(payload)  res.status(201).json(payload)
/// res.json(201, payload)                                     // status argument
/// res.sendStatus(204)                                        // no payload
/// ```
pub fn find_js_responses(handler: &str, res: &str) -> Vec<ResponseCall> {
    let res = regex::escape(res);
    let mut calls = Vec::new();

    let chained = Regex::new(&format!(
        r"\b{res}\s*(?:\.\s*status\s*\(\s*(\d{{3}})\s*\)\s*)?\.\s*(?:json|send|jsonp)\s*\("
    ));
    if let Ok(chained) = chained {
        for caps in chained.captures_iter(handler) {
            let Some(call) = caps.get(0) else { continue };
            let open = call.end() - 1;
            let Some(close) = lexer::find_closing(handler, open, Syntax::JavaScript) else {
                continue;
            };
            let args_text = handler[open + 1..close].trim();
            let explicit_status = caps.get(1).map(|m| m.as_str().to_string());

            let (status_code, payload) = match explicit_status {
                Some(status) => (status, args_text.to_string()),
                None => {
                    let args = lexer::split_top_level(args_text, b',', Syntax::JavaScript);
                    match args.as_slice() {
                        [status, payload, ..] if is_status_literal(status) => {
                            (status.to_string(), payload.to_string())
                        }
                        _ => (DEFAULT_STATUS.to_string(), args_text.to_string()),
                    }
                }
            };

            calls.push(ResponseCall {
                offset: call.start(),
                status_code,
                payload,
            });
        }
    }

    let send_status = Regex::new(&format!(r"\b{res}\s*\.\s*sendStatus\s*\(\s*(\d{{3}})\s*\)"));
    if let Ok(send_status) = send_status {
        for caps in send_status.captures_iter(handler) {
            calls.push(ResponseCall {
                offset: caps.get(0).map_or(0, |m| m.start()),
                status_code: caps[1].to_string(),
                payload: String::new(),
            });
        }
    }

    calls.sort_by_key(|c| c.offset);
    calls
}

/// Finds Django/DRF response constructions.
///
/// ```text
/// return Response(serializer.data, status=status.HTTP_201_CREATED)
/// return JsonResponse({'detail': 'missing'}, status=404)
/// return HttpResponse(status=204)
/// ```
///
/// The payload is the first positional argument or the `data=` keyword.
pub fn find_python_responses(handler: &str) -> Vec<ResponseCall> {
    let masked = lexer::mask_comments(handler, Syntax::Python);
    let mut calls = Vec::new();

    for found in PYTHON_RESPONSE.find_iter(&masked) {
        let open = found.end() - 1;
        let Some(close) = lexer::find_closing(&masked, open, Syntax::Python) else {
            continue;
        };

        let mut status_code = DEFAULT_STATUS.to_string();
        let mut payload = None;
        for arg in lexer::split_arguments(handler, &masked, open, close, Syntax::Python) {
            if let Some(caps) = KEYWORD_ARGUMENT.captures(arg) {
                let value = caps[2].trim();
                match &caps[1] {
                    "status" => {
                        if let Some(code) = PYTHON_STATUS.captures(value) {
                            status_code = code[1].to_string();
                        }
                    }
                    "data" => payload = Some(value.to_string()),
                    _ => {}
                }
            } else if payload.is_none() {
                payload = Some(arg.to_string());
            }
        }

        calls.push(ResponseCall {
            offset: found.start(),
            status_code,
            payload: payload.unwrap_or_default(),
        });
    }

    calls
}

fn is_status_literal(text: &str) -> bool {
    text.len() == 3 && text.bytes().all(|b| b.is_ascii_digit())
}

/// Classifies response payload expressions found in one handler.
pub struct StructureAnalyzer<'a> {
    /// Handler text searched for variable assignments
    source: &'a str,
    syntax: Syntax,
    /// Descriptors for expressions known from elsewhere, e.g. `serializer.data`
    hints: BTreeMap<String, BodyDescriptor>,
}

impl<'a> StructureAnalyzer<'a> {
    pub fn new(source: &'a str, syntax: Syntax) -> Self {
        Self {
            source,
            syntax,
            hints: BTreeMap::new(),
        }
    }

    /// Classifies `expression` as `descriptor` wherever it appears as a payload.
    pub fn with_hint(mut self, expression: &str, descriptor: BodyDescriptor) -> Self {
        self.hints
            .insert(lexer::collapse_whitespace(expression), descriptor);
        self
    }

    /// Classifies one payload found at byte `offset` of the handler.
    pub fn analyze_structure(&self, payload: &str, offset: usize) -> BodyDescriptor {
        self.classify(payload, offset, true)
    }

    /// Turns located calls into response shapes, preserving their order.
    pub fn analyze_calls(&self, calls: &[ResponseCall]) -> Vec<ResponseShape> {
        calls
            .iter()
            .map(|call| ResponseShape {
                status_code: call.status_code.clone(),
                response_body: lexer::collapse_whitespace(&lexer::strip_comments(
                    &call.payload,
                    self.syntax,
                )),
                body: self.analyze_structure(&call.payload, call.offset),
            })
            .collect()
    }

    fn classify(&self, payload: &str, offset: usize, follow_alias: bool) -> BodyDescriptor {
        let stripped = lexer::strip_comments(payload, self.syntax);
        let text = stripped.trim();

        if let Some(hint) = self.hints.get(&lexer::collapse_whitespace(text)) {
            return hint.clone();
        }

        if let Some(value) = lexer::string_literal_value(text) {
            return BodyDescriptor::String {
                example: value.to_string(),
            };
        }
        if NUMBER.is_match(text) {
            if let Ok(example) = text.parse::<f64>() {
                return BodyDescriptor::Number { example };
            }
        }
        match text {
            "true" | "True" => return BodyDescriptor::Boolean { example: true },
            "false" | "False" => return BodyDescriptor::Boolean { example: false },
            _ => {}
        }

        if text.starts_with('{') && text.ends_with('}') {
            return BodyDescriptor::object(self.object_keys(&text[1..text.len() - 1]));
        }

        if lexer::is_identifier(text) {
            if follow_alias {
                if let Some((rhs, rhs_offset)) = self.preceding_assignment(text, offset) {
                    debug!("Following '{}' to its assignment: {}", text, rhs);
                    return self.classify(rhs, rhs_offset, false);
                }
            }
            return BodyDescriptor::Variable {
                variable: text.to_string(),
            };
        }

        if ERROR_TOKEN.is_match(text) {
            return BodyDescriptor::error();
        }

        BodyDescriptor::Unknown {
            raw: lexer::collapse_whitespace(text),
        }
    }

    fn object_keys(&self, inner: &str) -> Vec<String> {
        lexer::split_top_level(inner, b',', self.syntax)
            .into_iter()
            // Spread and dict unpacking contribute no named key
            .filter(|entry| !entry.starts_with("...") && !entry.starts_with("**"))
            .filter_map(|entry| {
                let key = lexer::split_top_level(entry, b':', self.syntax)
                    .into_iter()
                    .next()?;
                let key = key.trim_matches(|c| c == '\'' || c == '"' || c == '`');
                (!key.is_empty()).then(|| key.to_string())
            })
            .collect()
    }

    /// Right-hand side of the last assignment to `name` before `offset`.
    fn preceding_assignment(&self, name: &str, offset: usize) -> Option<(&'a str, usize)> {
        let source = self.source;
        let limit = offset.min(source.len());
        let pattern = format!(r"(?:^|[^\w$.]){}\s*(=)(?:[^=>]|$)", regex::escape(name));
        let regex = Regex::new(&pattern).ok()?;

        let eq = regex
            .captures_iter(&source[..limit])
            .filter_map(|caps| caps.get(1))
            .last()?;
        let start = eq.end();
        let end = lexer::statement_end(source, start, self.syntax);
        let rhs = source[start..end].trim();
        (!rhs.is_empty()).then_some((rhs, start))
    }
}

/// The primary response: the first 2xx entry, or the first entry when none is 2xx.
pub fn select_primary(shapes: &[ResponseShape]) -> Option<ResponseShape> {
    shapes
        .iter()
        .find(|s| s.is_success())
        .or_else(|| shapes.first())
        .cloned()
}
