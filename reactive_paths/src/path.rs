//! Property paths and their decomposition into links.
//!
//! A path is written the way it would be accessed: `child.name`,
//! `Items[0]`, `Lookup["key", 2].value` or `(child as Fixture).name`. A
//! bracket group directly after an identifier is the named indexer of the
//! current object; further bracket groups index the previous result through
//! its default indexer, `Item`.
//!
//! Text is first parsed into a [`PathExpr`], which can also be built by
//! hand, and then [`decompose`]d into a [`Path`] of [`Link`]s.
//!
//! ```rust
//! use reactive_paths::path::{decompose, Path, PathExpr};
//!
//! let parsed = Path::parse("(child as Fixture).Items[1, \"a\"].name").unwrap();
//! let built = decompose(
//!     &PathExpr::root()
//!         .member("child")
//!         .convert("Fixture")
//!         .index("Items", [PathExpr::constant(1), PathExpr::constant("a")])
//!         .member("name"),
//! )
//! .unwrap();
//! assert_eq!(parsed, built);
//! assert_eq!(parsed.to_string(), "child.Items[1, \"a\"].name");
//! ```

use crate::{
    error::{Error, Result},
    object::TypeInfo,
    value::Value,
};
use std::{
    fmt::{self, Display, Formatter},
    sync::Arc,
};

/// The name of the indexer used by bare bracket groups, as in `a[0][1]`.
pub const DEFAULT_INDEXER: &str = "Item";

/// The suffix appended to an indexer's name in change notifications.
pub const INDEXER_SUFFIX: &str = "[]";

/// The most expression nodes (members, indexers, conversions and nested
/// groups) a path text may contain.
pub const MAX_PATH_NODES: usize = 512;

/// An access expression, before it is checked to be a plain chain.
#[derive(Clone, Debug, PartialEq)]
pub enum PathExpr {
    /// The object the path starts from.
    Root,
    /// A field or property of `target`.
    Member {
        /// The expression whose member is read.
        target: Box<PathExpr>,
        /// The member name.
        name: Arc<str>,
    },
    /// A named indexer of `target`, applied to `args`.
    Index {
        /// The expression whose indexer is applied.
        target: Box<PathExpr>,
        /// The indexer name.
        name: Arc<str>,
        /// The index arguments.
        args: Vec<PathExpr>,
    },
    /// A type conversion, which does not change which member is read.
    Convert {
        /// The converted expression.
        operand: Box<PathExpr>,
        /// The target type, by name.
        to: Arc<str>,
    },
    /// A method call. Never valid inside a path.
    Call {
        /// The receiver.
        target: Box<PathExpr>,
        /// The method name.
        method: Arc<str>,
        /// The call arguments.
        args: Vec<PathExpr>,
    },
    /// A literal value.
    Constant(Value),
}

impl PathExpr {
    /// The root of a path.
    pub fn root() -> Self {
        PathExpr::Root
    }

    /// A literal.
    pub fn constant(value: impl Into<Value>) -> Self {
        PathExpr::Constant(value.into())
    }

    /// Reads `name` on this expression.
    pub fn member(self, name: impl Into<Arc<str>>) -> Self {
        PathExpr::Member {
            target: Box::new(self),
            name: name.into(),
        }
    }

    /// Applies the indexer `name` of this expression.
    pub fn index(
        self,
        name: impl Into<Arc<str>>,
        args: impl IntoIterator<Item = PathExpr>,
    ) -> Self {
        PathExpr::Index {
            target: Box::new(self),
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }

    /// Converts this expression to the type `to`.
    pub fn convert(self, to: impl Into<Arc<str>>) -> Self {
        PathExpr::Convert {
            operand: Box::new(self),
            to: to.into(),
        }
    }

    /// Calls `method` on this expression.
    pub fn call(
        self,
        method: impl Into<Arc<str>>,
        args: impl IntoIterator<Item = PathExpr>,
    ) -> Self {
        PathExpr::Call {
            target: Box::new(self),
            method: method.into(),
            args: args.into_iter().collect(),
        }
    }

    /// Parses the textual form of a path. Texts with more than
    /// [`MAX_PATH_NODES`] nodes are rejected.
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            nodes: 0,
        };
        let expr = parser.expr()?;
        match parser.peek() {
            None => Ok(expr),
            Some(token) => Err(Error::invalid_path(format!(
                "unexpected {} after the end of the path",
                token.describe()
            ))),
        }
    }

    fn strip_conversions(&self) -> &PathExpr {
        let mut expr = self;
        while let PathExpr::Convert { operand, .. } = expr {
            expr = operand;
        }
        expr
    }
}

/// Whether a link reads a plain member or applies an indexer.
#[derive(Clone, Debug, PartialEq)]
pub enum LinkKind {
    /// A field or property.
    Member,
    /// An indexer with its constant arguments.
    Indexer(Arc<[Value]>),
}

/// One step of a path.
#[derive(Clone, Debug, PartialEq)]
pub struct Link {
    name: Arc<str>,
    kind: LinkKind,
    static_type: Option<TypeInfo>,
}

/// The identity of a link for provider resolution: indexer arguments are
/// ignored, but an indexer never shares a key with a member of the same name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LinkKey {
    name: Arc<str>,
    indexer: bool,
}

impl Link {
    /// A field or property link.
    pub fn member(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            kind: LinkKind::Member,
            static_type: None,
        }
    }

    /// An indexer link.
    pub fn indexer(
        name: impl Into<Arc<str>>,
        args: impl IntoIterator<Item = Value>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: LinkKind::Indexer(args.into_iter().collect()),
            static_type: None,
        }
    }

    /// The member or indexer name.
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// Whether this is a member or an indexer link.
    pub fn kind(&self) -> &LinkKind {
        &self.kind
    }

    /// The index arguments; empty for member links.
    pub fn args(&self) -> &[Value] {
        match &self.kind {
            LinkKind::Member => &[],
            LinkKind::Indexer(args) => args,
        }
    }

    /// Whether this link applies an indexer.
    pub fn is_indexer(&self) -> bool {
        matches!(self.kind, LinkKind::Indexer(_))
    }

    /// The declaring type, when the path was bound to a root type.
    pub fn static_type(&self) -> Option<TypeInfo> {
        self.static_type
    }

    /// The name change notifications use for this link: the member name,
    /// with [`INDEXER_SUFFIX`] appended for indexers.
    pub fn notification_name(&self) -> Arc<str> {
        match self.kind {
            LinkKind::Member => Arc::clone(&self.name),
            LinkKind::Indexer(_) => {
                Arc::from(format!("{}{INDEXER_SUFFIX}", self.name))
            }
        }
    }

    /// The key providers are resolved by.
    pub fn key(&self) -> LinkKey {
        LinkKey {
            name: Arc::clone(&self.name),
            indexer: self.is_indexer(),
        }
    }
}

impl Display for Link {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let LinkKind::Indexer(args) = &self.kind {
            f.write_str("[")?;
            for (idx, arg) in args.iter().enumerate() {
                if idx > 0 {
                    f.write_str(", ")?;
                }
                arg.fmt_literal(f)?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

/// A non-empty chain of links, from the root to the observed member.
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    links: Arc<[Link]>,
}

impl Path {
    /// Builds a path from its links.
    ///
    /// # Errors
    /// [`Error::InvalidPathShape`] when `links` is empty.
    pub fn new(links: impl IntoIterator<Item = Link>) -> Result<Self> {
        let links: Arc<[Link]> = links.into_iter().collect();
        if links.is_empty() {
            return Err(Error::invalid_path("the path has no member"));
        }
        Ok(Self { links })
    }

    /// Parses and decomposes a path.
    pub fn parse(text: &str) -> Result<Self> {
        decompose(&PathExpr::parse(text)?)
    }

    /// The links, root first.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// The number of links.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// The link read from the root.
    pub fn first(&self) -> &Link {
        &self.links[0]
    }

    /// The observed link and the links leading to it.
    pub fn split_last(&self) -> (&Link, &[Link]) {
        let (init, last) = self.links.split_at(self.links.len() - 1);
        (&last[0], init)
    }

    /// The type the path was bound to, if any.
    pub fn root_type(&self) -> Option<TypeInfo> {
        self.first().static_type
    }

    /// Returns this path with its first link declared on `ty`. The engine
    /// then rejects roots of any other runtime type.
    pub fn bind_root(&self, ty: TypeInfo) -> Self {
        let mut links = self.links.to_vec();
        links[0].static_type = Some(ty);
        Self {
            links: links.into(),
        }
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (idx, link) in self.links.iter().enumerate() {
            if idx > 0 {
                f.write_str(".")?;
            }
            Display::fmt(link, f)?;
        }
        Ok(())
    }
}

/// Turns an access expression into a path.
///
/// Conversions are skipped. Method calls, constants in chain position,
/// non-constant index arguments and a bare root are rejected with
/// [`Error::InvalidPathShape`]. Decomposition is pure: the same expression
/// always yields the same path.
pub fn decompose(expr: &PathExpr) -> Result<Path> {
    Path::new(collect_links(expr)?)
}

/// Walks from the outermost access down to the root.
fn collect_links(expr: &PathExpr) -> Result<Vec<Link>> {
    let mut links = Vec::new();
    let mut current = expr;
    loop {
        current = match current {
            PathExpr::Root => break,
            PathExpr::Convert { operand, .. } => operand,
            PathExpr::Member { target, name } => {
                links.push(Link::member(Arc::clone(name)));
                target
            }
            PathExpr::Index { target, name, args } => {
                let args = args
                    .iter()
                    .map(|arg| match arg.strip_conversions() {
                        PathExpr::Constant(value) => Ok(value.clone()),
                        _ => Err(Error::invalid_path(format!(
                            "the arguments of indexer `{name}` must be constants"
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()?;
                links.push(Link::indexer(Arc::clone(name), args));
                target
            }
            PathExpr::Call { method, .. } => {
                return Err(Error::invalid_path(format!(
                    "method call `{method}(..)` cannot be observed"
                )))
            }
            PathExpr::Constant(value) => {
                return Err(Error::invalid_path(format!(
                    "constant `{value}` is not a member access"
                )))
            }
        };
    }
    links.reverse();
    Ok(links)
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Dot,
    Comma,
    LBracket,
    RBracket,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier `{name}`"),
            Token::Int(n) => format!("number `{n}`"),
            Token::Float(n) => format!("number `{n}`"),
            Token::Str(s) => format!("string {s:?}"),
            Token::Dot => "`.`".into(),
            Token::Comma => "`,`".into(),
            Token::LBracket => "`[`".into(),
            Token::RBracket => "`]`".into(),
            Token::LParen => "`(`".into(),
            Token::RParen => "`)`".into(),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '.' | ',' | '[' | ']' | '(' | ')' => {
                chars.next();
                tokens.push(match c {
                    '.' => Token::Dot,
                    ',' => Token::Comma,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '(' => Token::LParen,
                    _ => Token::RParen,
                });
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((_, '"')) => break,
                        Some((_, '\\')) => match chars.next() {
                            Some((_, c @ ('"' | '\\'))) => s.push(c),
                            Some((_, c)) => {
                                return Err(Error::invalid_path(format!(
                                    "unknown escape `\\{c}` in string"
                                )))
                            }
                            None => {
                                return Err(Error::invalid_path(
                                    "unterminated string literal",
                                ))
                            }
                        },
                        Some((_, c)) => s.push(c),
                        None => {
                            return Err(Error::invalid_path(
                                "unterminated string literal",
                            ))
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() || c == '-' => {
                chars.next();
                let mut end = start + c.len_utf8();
                let mut is_float = false;
                while let Some(&(idx, c)) = chars.peek() {
                    let fraction_dot = c == '.'
                        && !is_float
                        && text[idx + 1..]
                            .chars()
                            .next()
                            .is_some_and(|c| c.is_ascii_digit());
                    if c.is_ascii_digit() || fraction_dot {
                        is_float |= fraction_dot;
                        end = idx + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &text[start..end];
                let token = if is_float {
                    literal.parse().map(Token::Float).ok()
                } else {
                    literal.parse().map(Token::Int).ok()
                };
                tokens.push(token.ok_or_else(|| {
                    Error::invalid_path(format!("invalid number `{literal}`"))
                })?);
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut end = start;
                while let Some(&(idx, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        end = idx + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(text[start..end].to_string()));
            }
            other => {
                return Err(Error::invalid_path(format!(
                    "unexpected character `{other}`"
                )))
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    nodes: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        match self.next() {
            Some(found) if found == token => Ok(()),
            Some(found) => Err(Error::invalid_path(format!(
                "expected {}, found {}",
                token.describe(),
                found.describe()
            ))),
            None => Err(Error::invalid_path(format!(
                "expected {}, found the end of the path",
                token.describe()
            ))),
        }
    }

    /// Counts one more node, bounding both the size of the tree and the
    /// recursion depth of the parser.
    fn grow(&mut self) -> Result<()> {
        self.nodes += 1;
        if self.nodes > MAX_PATH_NODES {
            return Err(Error::invalid_path(format!(
                "the path has more than {MAX_PATH_NODES} nodes"
            )));
        }
        Ok(())
    }

    fn ident(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            Some(other) => Err(Error::invalid_path(format!(
                "expected a member name, found {}",
                other.describe()
            ))),
            None => Err(Error::invalid_path(
                "expected a member name, found the end of the path",
            )),
        }
    }

    /// expr := primary ( '.' access | '[' args ']' )*
    fn expr(&mut self) -> Result<PathExpr> {
        self.grow()?;
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let name = self.ident()?;
                expr = self.access(expr, name)?;
            } else if self.eat(&Token::LBracket) {
                self.grow()?;
                let args = self.args(Token::RBracket)?;
                expr = expr.index(DEFAULT_INDEXER, args);
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<PathExpr> {
        match self.next() {
            Some(Token::LParen) => {
                let operand = self.expr()?;
                let expr = match self.peek() {
                    Some(Token::Ident(kw)) if kw == "as" => {
                        self.pos += 1;
                        self.grow()?;
                        let to = self.ident()?;
                        operand.convert(to)
                    }
                    _ => operand,
                };
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Ident(kw)) if kw == "true" || kw == "false" => {
                Ok(PathExpr::constant(kw == "true"))
            }
            Some(Token::Ident(kw)) if kw == "null" => {
                Ok(PathExpr::Constant(Value::Null))
            }
            Some(Token::Ident(name)) => self.access(PathExpr::Root, name),
            Some(Token::Int(n)) => Ok(PathExpr::constant(n)),
            Some(Token::Float(n)) => Ok(PathExpr::constant(n)),
            Some(Token::Str(s)) => Ok(PathExpr::constant(s)),
            Some(other) => Err(Error::invalid_path(format!(
                "unexpected {}",
                other.describe()
            ))),
            None => Err(Error::invalid_path("the path is empty")),
        }
    }

    /// `name`, `name[args]` or `name(args)` applied to `target`.
    fn access(&mut self, target: PathExpr, name: String) -> Result<PathExpr> {
        self.grow()?;
        if self.eat(&Token::LBracket) {
            let args = self.args(Token::RBracket)?;
            Ok(target.index(name, args))
        } else if self.eat(&Token::LParen) {
            let args = self.args(Token::RParen)?;
            Ok(target.call(name, args))
        } else {
            Ok(target.member(name))
        }
    }

    fn args(&mut self, close: Token) -> Result<Vec<PathExpr>> {
        let mut args = Vec::new();
        if self.eat(&close) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&close) {
                return Ok(args);
            }
            self.expect(Token::Comma)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{decompose, Link, Path, PathExpr, MAX_PATH_NODES};
    use crate::{
        error::Error,
        object::{ObjectType, TypeInfo},
        reflection::MemberTable,
        value::Value,
    };

    #[test]
    fn parses_dotted_members() {
        let path = Path::parse("child.name").unwrap();
        assert_eq!(
            path.links(),
            &[Link::member("child"), Link::member("name")]
        );
        assert_eq!(path.len(), 2);
        assert_eq!(path.first().name().as_ref(), "child");
        assert_eq!(path.split_last().0.name().as_ref(), "name");
    }

    #[test]
    fn parses_indexers() {
        let path = Path::parse(r#"Items["a\"b", -2, 1.5, true, null][0]"#)
            .unwrap();
        assert_eq!(
            path.links(),
            &[
                Link::indexer(
                    "Items",
                    [
                        Value::from("a\"b"),
                        Value::from(-2),
                        Value::from(1.5),
                        Value::from(true),
                        Value::Null,
                    ]
                ),
                Link::indexer("Item", [Value::from(0)]),
            ]
        );
        assert!(path.first().is_indexer());
    }

    #[test]
    fn conversions_are_skipped() {
        let converted = Path::parse("((child as Fixture).next as Node).name");
        assert_eq!(converted, Path::parse("child.next.name"));
    }

    #[test]
    fn display_round_trips() {
        for text in [
            "child.name",
            "child.Items[1, \"a\"].name",
            "Items[0].Item[2.0]",
            "Lookup[\"x\\\\y\"]",
        ] {
            let path = Path::parse(text).unwrap();
            assert_eq!(path.to_string(), text);
            assert_eq!(Path::parse(&path.to_string()).unwrap(), path);
        }
    }

    #[test]
    fn decomposition_is_deterministic() {
        let expr = PathExpr::root()
            .member("child")
            .index("Items", [PathExpr::constant(3).convert("object")]);
        assert_eq!(decompose(&expr), decompose(&expr));
        assert_eq!(decompose(&expr), Path::parse("child.Items[3]"));
    }

    #[test]
    fn rejects_non_chains() {
        let cases = [
            PathExpr::root(),
            PathExpr::root().member("child").call("ToString", Vec::new()),
            PathExpr::constant(3).member("x"),
            PathExpr::root()
                .index("Items", [PathExpr::root().member("idx")]),
        ];
        for expr in cases {
            assert!(
                matches!(decompose(&expr), Err(Error::InvalidPathShape { .. })),
                "{expr:?} was accepted"
            );
        }
        for text in ["", "child.", "child..name", "Items[0", "a b", "a.Do()"] {
            assert!(
                matches!(Path::parse(text), Err(Error::InvalidPathShape { .. })),
                "{text:?} was accepted"
            );
        }
    }

    #[test]
    fn oversized_paths_are_rejected() {
        let long = format!("a{}", ".a".repeat(100_000));
        let nested = format!("{}a{}", "(".repeat(100_000), ")".repeat(100_000));
        let indexed = format!("a{}", "[0]".repeat(100_000));
        for text in [long, nested, indexed] {
            assert!(matches!(
                Path::parse(&text),
                Err(Error::InvalidPathShape { .. })
            ));
        }

        let within = format!("a{}", ".a".repeat(MAX_PATH_NODES - 2));
        assert_eq!(Path::parse(&within).unwrap().len(), MAX_PATH_NODES - 1);
    }

    #[test]
    fn long_expression_chains_decompose() {
        let expr = (0..1_000).fold(PathExpr::root(), |expr, idx| {
            expr.member(format!("m{idx}")).convert("object")
        });
        let path = decompose(&expr).unwrap();
        assert_eq!(path.len(), 1_000);
        assert_eq!(path.first().name().as_ref(), "m0");
        assert_eq!(path.split_last().0.name().as_ref(), "m999");
    }

    #[test]
    fn indexer_and_member_links_are_distinct() {
        let member = Link::member("Items");
        let indexer = Link::indexer("Items", [Value::from(0)]);
        assert_ne!(member.key(), indexer.key());
        assert_eq!(member.notification_name().as_ref(), "Items");
        assert_eq!(indexer.notification_name().as_ref(), "Items[]");
        // arguments don't matter for resolution
        assert_eq!(indexer.key(), Link::indexer("Items", Vec::new()).key());
    }

    #[test]
    fn bind_root_stamps_the_first_link() {
        struct Root;
        impl ObjectType for Root {
            fn describe(_: &mut MemberTable<Self>) {}
        }

        let path = Path::parse("a.b").unwrap();
        assert_eq!(path.root_type(), None);
        let bound = path.bind_root(TypeInfo::of::<Root>());
        assert_eq!(bound.root_type(), Some(TypeInfo::of::<Root>()));
        assert_eq!(bound.links()[1].static_type(), None);
        assert_eq!(bound.to_string(), "a.b");
    }
}
