use super::arena::{Arena, DraftNode, NodeId};
use super::error::FilterParseError;
use super::name::{ANY_DEEP, ANY_SHALLOW, NameMatcher};
use super::node::FilterNode;
use super::normalize;
use crate::cache::{CacheStats, ConcurrentCache};
use crate::config::CacheSpec;
use crate::metrics::MetricsSource;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use tracing::{debug, trace};

/// Compile a filter expression without consulting any cache.
///
/// Blank text compiles to an empty list, which excludes everything.
pub fn parse_filter(filter: &str) -> Result<Vec<FilterNode>, FilterParseError> {
    let filter = filter.trim();
    if filter.is_empty() {
        return Ok(Vec::new());
    }

    let mut parser = ExpressionParser::new(filter);
    let root = parser.root;
    parser.parse_expression_list(root, None)?;

    let mut arena = parser.arena;
    normalize::analyze(&mut arena, root);
    Ok(arena.freeze_children(root))
}

/// Compiles filter expressions and memoizes the result by trimmed text.
///
/// Compiled trees are frozen, so the same `Arc` is handed to every caller
/// that asks for the same text while it stays cached.
#[derive(Debug)]
pub struct FilterParser {
    cache: ConcurrentCache<String, Arc<[FilterNode]>>,
}

impl Default for FilterParser {
    fn default() -> Self {
        Self::new(&CacheSpec::default())
    }
}

impl FilterParser {
    pub fn new(spec: &CacheSpec) -> Self {
        Self {
            cache: ConcurrentCache::new(spec),
        }
    }

    pub fn parse(&self, filter: &str) -> Result<Arc<[FilterNode]>, FilterParseError> {
        static EMPTY: LazyLock<Arc<[FilterNode]>> = LazyLock::new(|| Vec::new().into());

        let filter = filter.trim();
        if filter.is_empty() {
            return Ok(EMPTY.clone());
        }

        self.cache.get_or_try_insert_with(filter.to_string(), || {
            trace!(filter, "filter cache miss");
            let nodes: Arc<[FilterNode]> = parse_filter(filter)?.into();
            debug!(filter, top_level = nodes.len(), "compiled filter expression");
            Ok(nodes)
        })
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl MetricsSource for FilterParser {
    fn apply_metrics(&self, metrics: &mut BTreeMap<String, u64>) {
        self.cache_stats().apply("parser.nodeCache.", metrics);
    }
}

/// A single field as written, before it is attached to the tree
struct Field {
    matcher: NameMatcher,
    position: usize,
}

/// Recursive-descent parser over the trimmed filter text
struct ExpressionParser<'a> {
    text: &'a str,
    pos: usize,
    arena: Arena,
    root: NodeId,
}

impl<'a> ExpressionParser<'a> {
    fn new(text: &'a str) -> Self {
        let (arena, root) = Arena::new();
        Self {
            text,
            pos: 0,
            arena,
            root,
        }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.rest().chars().next()
    }

    fn bump(&mut self, c: char) {
        self.pos += c.len_utf8();
    }

    fn unexpected(&self, expected: &str) -> FilterParseError {
        match self.rest().chars().next() {
            Some(found) => FilterParseError::syntax(
                self.pos,
                format!("expected {expected}, found '{found}'"),
            ),
            None => FilterParseError::syntax(
                self.pos,
                format!("expected {expected}, found end of input"),
            ),
        }
    }

    /// expr_list := expr (',' expr)*
    ///
    /// `close` is the bracket that terminates a nested list; `None` at top level.
    fn parse_expression_list(
        &mut self,
        parent: NodeId,
        close: Option<char>,
    ) -> Result<(), FilterParseError> {
        loop {
            self.parse_expression(parent)?;

            match self.peek() {
                Some(',') => self.bump(','),
                Some(c) if Some(c) == close => {
                    self.bump(c);
                    return Ok(());
                }
                None if close.is_none() => return Ok(()),
                _ => {
                    let expected = match close {
                        Some(c) => format!("',' or '{c}'"),
                        None => "',' or end of input".to_string(),
                    };
                    return Err(self.unexpected(&expected));
                }
            }
        }
    }

    fn parse_expression(&mut self, parent: NodeId) -> Result<(), FilterParseError> {
        match self.peek() {
            Some('-') => {
                self.bump('-');
                self.parse_negated_expression(parent)
            }
            Some('(') => {
                self.bump('(');
                let fields = self.parse_field_list()?;
                self.attach(parent, fields)
            }
            _ => {
                let mut path = self.parse_path()?;
                let terminal = path.pop().ok_or_else(|| self.unexpected("field"))?;

                let mut parent = parent;
                if !path.is_empty() {
                    self.arena.get_mut(parent).squiggly = true;
                    for field in path {
                        parent = self
                            .arena
                            .add_child(parent, DraftNode::new(field.matcher).dot_pathed(true));
                        self.arena.get_mut(parent).squiggly = true;
                    }
                }

                self.attach(parent, vec![terminal])
            }
        }
    }

    /// neg_expr := '-' (field | dot_path)
    fn parse_negated_expression(&mut self, parent: NodeId) -> Result<(), FilterParseError> {
        let position = self.pos;
        let path = self.parse_path()?;

        if path.iter().any(|f| f.matcher.is_any_deep()) {
            return Err(FilterParseError::syntax(
                position,
                "'**' cannot be negated",
            ));
        }

        if path.len() == 1 {
            let field = path.into_iter().next().ok_or_else(|| self.unexpected("field"))?;
            self.arena
                .add_child(parent, DraftNode::new(field.matcher).negated(true));
        } else {
            let mut parent = parent;
            for field in path {
                self.arena.get_mut(parent).squiggly = true;
                parent = self.arena.add_child(
                    parent,
                    DraftNode::new(field.matcher)
                        .negative_parent(true)
                        .dot_pathed(true),
                );
            }
            let terminal = self.arena.get_mut(parent);
            terminal.negated = true;
            terminal.negative_parent = false;
        }

        if matches!(self.peek(), Some('[' | '{')) {
            return Err(FilterParseError::syntax(
                self.pos,
                "negated fields cannot have a nested expression",
            ));
        }

        Ok(())
    }

    /// field_list := '(' field (',' field)* ')'
    fn parse_field_list(&mut self) -> Result<Vec<Field>, FilterParseError> {
        let mut fields = Vec::new();
        loop {
            let field = self.parse_field()?;
            if field.matcher.is_any_deep() {
                return Err(FilterParseError::syntax(
                    field.position,
                    "'**' is not allowed in a field list",
                ));
            }
            fields.push(field);

            match self.peek() {
                Some(',') => self.bump(','),
                Some(')') => {
                    self.bump(')');
                    return Ok(fields);
                }
                _ => return Err(self.unexpected("',' or ')'")),
            }
        }
    }

    /// field ('.' field)*, or a lone `**`
    fn parse_path(&mut self) -> Result<Vec<Field>, FilterParseError> {
        let first = self.parse_field()?;
        if first.matcher.is_any_deep() {
            if self.peek() == Some('.') {
                return Err(FilterParseError::syntax(
                    self.pos,
                    "'**' cannot be part of a dot-path",
                ));
            }
            return Ok(vec![first]);
        }

        let mut path = vec![first];
        while self.peek() == Some('.') {
            self.bump('.');
            let field = self.parse_field()?;
            if field.matcher.is_any_deep() {
                return Err(FilterParseError::syntax(
                    field.position,
                    "'**' cannot be part of a dot-path",
                ));
            }
            path.push(field);
        }
        Ok(path)
    }

    /// Attach each field under `parent`, then give every one of them the
    /// optional nested expression that follows.
    fn attach(&mut self, parent: NodeId, fields: Vec<Field>) -> Result<(), FilterParseError> {
        let close = match self.peek() {
            Some('[') => Some(']'),
            Some('{') => Some('}'),
            _ => None,
        };

        let Some(close) = close else {
            for field in fields {
                self.arena.add_child(parent, DraftNode::new(field.matcher));
            }
            return Ok(());
        };

        self.pos += 1;
        let nested_start = self.pos;
        let empty = self.peek() == Some(close);
        let mut nested_end = nested_start;

        for field in fields {
            let node = self
                .arena
                .add_child(parent, DraftNode::new(field.matcher).empty_nested(empty));

            if empty {
                self.skip_whitespace();
                nested_end = self.pos + close.len_utf8();
            } else {
                // field lists share one nested expression; re-read it per field
                self.pos = nested_start;
                self.arena.get_mut(node).squiggly = true;
                self.parse_expression_list(node, Some(close))?;
                nested_end = self.pos;
            }
        }

        self.pos = nested_end;
        Ok(())
    }

    fn parse_field(&mut self) -> Result<Field, FilterParseError> {
        self.skip_whitespace();
        let position = self.pos;

        match self.rest().chars().next() {
            Some(delimiter @ ('~' | '/')) => self.parse_regex_field(delimiter),
            Some(c) if is_name_start(c) => {
                let len = self
                    .rest()
                    .char_indices()
                    .find(|&(_, c)| !is_name_char(c))
                    .map(|(i, _)| i)
                    .unwrap_or(self.rest().len());
                let text = &self.rest()[..len];
                self.pos += len;

                let matcher = match text {
                    ANY_DEEP => NameMatcher::AnyDeep,
                    ANY_SHALLOW => NameMatcher::AnyShallow,
                    _ if text.contains(['*', '?']) => {
                        NameMatcher::wildcard(text).map_err(|source| {
                            FilterParseError::InvalidRegex {
                                position,
                                pattern: text.to_string(),
                                source,
                            }
                        })?
                    }
                    _ => NameMatcher::exact(text),
                };

                Ok(Field { matcher, position })
            }
            _ => Err(self.unexpected("field")),
        }
    }

    /// regex := '~' pattern '~' flags | '/' pattern '/' flags
    fn parse_regex_field(&mut self, delimiter: char) -> Result<Field, FilterParseError> {
        let position = self.pos;
        self.bump(delimiter);

        let mut pattern = String::new();
        let mut chars = self.rest().char_indices();
        let mut closed_at = None;

        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, escaped)) if escaped == delimiter => pattern.push(escaped),
                    Some((_, escaped)) => {
                        pattern.push('\\');
                        pattern.push(escaped);
                    }
                    None => break,
                },
                c if c == delimiter => {
                    closed_at = Some(i);
                    break;
                }
                c => pattern.push(c),
            }
        }

        let Some(closed_at) = closed_at else {
            return Err(FilterParseError::syntax(
                position,
                format!("unterminated regex, expected closing '{delimiter}'"),
            ));
        };
        self.pos += closed_at + delimiter.len_utf8();

        if pattern.is_empty() {
            return Err(FilterParseError::syntax(position, "empty regex pattern"));
        }

        let mut case_insensitive = false;
        while let Some(flag) = self.rest().chars().next().filter(char::is_ascii_alphabetic) {
            if flag != 'i' {
                return Err(FilterParseError::syntax(
                    self.pos,
                    format!("unknown regex flag '{flag}'"),
                ));
            }
            case_insensitive = true;
            self.bump(flag);
        }

        let literal = &self.text[position..self.pos];
        let matcher = NameMatcher::regex(literal, pattern.as_str(), case_insensitive).map_err(
            |source| FilterParseError::InvalidRegex {
                position,
                pattern,
                source,
            },
        )?;

        Ok(Field { matcher, position })
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '@' | '*' | '?')
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c == '-'
}
