//! Request shape inference.
//!
//! A handler's request shape is the set of fields it reads from the request
//! object, grouped by category. Each dialect supplies its own access patterns
//! through [`RequestPatterns`]; the collection and normalisation are shared.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Where on the request a field is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequestCategory {
    Body,
    Params,
    Headers,
    Query,
}

/// Field names read by a handler, per category, sorted and de-duplicated.
///
/// A category the handler never touches is an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestShape {
    pub body: Vec<String>,
    pub params: Vec<String>,
    pub headers: Vec<String>,
    pub query: Vec<String>,
}

impl RequestShape {
    pub fn fields(&self, category: RequestCategory) -> &[String] {
        match category {
            RequestCategory::Body => &self.body,
            RequestCategory::Params => &self.params,
            RequestCategory::Headers => &self.headers,
            RequestCategory::Query => &self.query,
        }
    }

    fn fields_mut(&mut self, category: RequestCategory) -> &mut Vec<String> {
        match category {
            RequestCategory::Body => &mut self.body,
            RequestCategory::Params => &mut self.params,
            RequestCategory::Headers => &mut self.headers,
            RequestCategory::Query => &mut self.query,
        }
    }

    /// Adds fields to a category, keeping it sorted and unique.
    pub fn extend<I, S>(&mut self, category: RequestCategory, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = self.fields_mut(category);
        let mut set: BTreeSet<String> = list.drain(..).collect();
        set.extend(fields.into_iter().map(Into::into).filter(|f| !f.is_empty()));
        list.extend(set);
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty() && self.params.is_empty() && self.headers.is_empty() && self.query.is_empty()
    }
}

/// How a pattern's first capture group is turned into field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    /// The group is one field name (`req.body.email`)
    Field,
    /// The group is a destructuring list (`const { a, b: c } = req.body`)
    Destructure,
}

#[derive(Debug, Clone)]
struct Rule {
    category: RequestCategory,
    regex: Regex,
    capture: Capture,
}

/// The access patterns of one dialect.
#[derive(Debug, Clone, Default)]
pub struct RequestPatterns {
    rules: Vec<Rule>,
}

impl RequestPatterns {
    /// Adds a pattern whose first capture group is a single field name.
    ///
    /// Invalid patterns are ignored.
    pub fn field(mut self, category: RequestCategory, pattern: &str) -> Self {
        if let Ok(regex) = Regex::new(pattern) {
            self.rules.push(Rule {
                category,
                regex,
                capture: Capture::Field,
            });
        }
        self
    }

    /// Adds a pattern whose first capture group is a `{ ... }` destructuring list.
    pub fn destructure(mut self, category: RequestCategory, pattern: &str) -> Self {
        if let Ok(regex) = Regex::new(pattern) {
            self.rules.push(Rule {
                category,
                regex,
                capture: Capture::Destructure,
            });
        }
        self
    }

    /// Express-style access off the request object named `req`.
    pub fn javascript(req: &str) -> Self {
        let req = regex::escape(req);
        let categories = [
            (RequestCategory::Body, "body"),
            (RequestCategory::Params, "params"),
            (RequestCategory::Headers, "headers"),
            (RequestCategory::Query, "query"),
        ];

        let mut patterns = Self::default();
        for (category, attr) in categories {
            patterns = patterns
                .field(category, &format!(r"\b{req}\s*\.\s*{attr}\s*\.\s*([A-Za-z_$][\w$]*)"))
                .field(
                    category,
                    &format!(r#"\b{req}\s*\.\s*{attr}\s*\[\s*['"`]([^'"`]+)['"`]\s*\]"#),
                )
                .destructure(
                    category,
                    &format!(r"(?:const|let|var)\s*\{{([^}}]*)\}}\s*=\s*{req}\s*\.\s*{attr}\b"),
                );
        }
        patterns
    }

    /// Django/DRF access off the request object named `request`.
    ///
    /// `request.data`, `request.POST` and `request.FILES` feed the body,
    /// `request.GET` and `request.query_params` the query, and `request.headers` and
    /// `request.META` the headers. Path parameters come from the URL pattern instead.
    pub fn python(request: &str) -> Self {
        let request = regex::escape(request);
        let key = r#"['"]([^'"]+)['"]"#;
        let sources = [
            (RequestCategory::Body, "data"),
            (RequestCategory::Body, "POST"),
            (RequestCategory::Body, "FILES"),
            (RequestCategory::Query, "GET"),
            (RequestCategory::Query, "query_params"),
            (RequestCategory::Headers, "headers"),
            (RequestCategory::Headers, "META"),
        ];

        let mut patterns = Self::default();
        for (category, attr) in sources {
            patterns = patterns
                .field(
                    category,
                    &format!(r"\b{request}\s*\.\s*{attr}\s*\.\s*get\s*\(\s*{key}"),
                )
                .field(
                    category,
                    &format!(r"\b{request}\s*\.\s*{attr}\s*\[\s*{key}\s*\]"),
                );
        }
        patterns
    }

    /// Runs every pattern over `handler`.
    pub fn extract(&self, handler: &str) -> RequestShape {
        let mut shape = RequestShape::default();

        for rule in &self.rules {
            for caps in rule.regex.captures_iter(handler) {
                let Some(group) = caps.get(1) else { continue };
                match rule.capture {
                    Capture::Field => shape.extend(rule.category, [group.as_str().trim()]),
                    Capture::Destructure => {
                        shape.extend(rule.category, destructured_names(group.as_str()))
                    }
                }
            }
        }

        shape
    }
}

/// Source-side key names of a destructuring list: `a, b: c, d = 1, ...rest` gives
/// `a`, `b`, `d`.
fn destructured_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty() && !entry.starts_with("..."))
        .filter_map(|entry| {
            let key = entry.split([':', '=']).next()?.trim();
            let key = key.trim_matches(|c| c == '\'' || c == '"');
            (!key.is_empty()).then(|| key.to_string())
        })
        .collect()
}
