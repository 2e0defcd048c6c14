use crate::{Param, Parameters, consume_while};
use std::{
    borrow::Cow,
    fmt::{self, Display},
    mem,
};

/// SQL text with its named parameters replaced by positional `?` markers.
///
/// A parameter is a single colon followed by one or more word characters (ASCII
/// letters, digits, underscore). The scan skips:
/// * `::name`, any run of two or more colons is copied literally (also covers casts
///   like `value::text`);
/// * quoted literals and identifiers: `'..'`, `".."`, `` `..` ``, a doubled quote
///   inside them does not close them;
/// * `-- ..` line comments and `/* .. */` block comments.
///
/// No whitespace is required before the colon, `(:a,:b)` has two parameters.
///
/// `names()` keeps duplicates and source order, `names().len()` always matches the
/// number of markers in `sql()`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedSql {
    fragments: Box<[String]>,
    names: Box<[String]>,
    sql: String,
}

fn is_word(c: &char) -> bool {
    c.is_ascii_alphanumeric() || *c == '_'
}

/// Consumes a literal starting with `quote`, up to and including the closing quote.
fn consume_quoted<'s>(input: &mut &'s str, quote: char) -> &'s str {
    let value = *input;
    let mut end = value.len();
    let mut chars = value.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        if c == quote {
            if value[i + 1..].starts_with(quote) {
                chars.next();
                continue;
            }
            end = i + 1;
            break;
        }
    }
    let (result, rest) = value.split_at(end);
    *input = rest;
    result
}

fn consume_until<'s>(input: &mut &'s str, terminator: &str, skip: usize) -> &'s str {
    let value = *input;
    let end = value[skip..]
        .find(terminator)
        .map(|i| skip + i + terminator.len())
        .unwrap_or(value.len());
    let (result, rest) = value.split_at(end);
    *input = rest;
    result
}

impl ParsedSql {
    pub fn parse(raw: &str) -> Self {
        let mut fragments = Vec::new();
        let mut names = Vec::new();
        let mut fragment = String::with_capacity(raw.len());
        let mut input = raw;
        while let Some(c) = input.chars().next() {
            match c {
                '\'' | '"' | '`' => fragment.push_str(consume_quoted(&mut input, c)),
                '-' if input.starts_with("--") => {
                    fragment.push_str(consume_until(&mut input, "\n", 2))
                }
                '/' if input.starts_with("/*") => {
                    fragment.push_str(consume_until(&mut input, "*/", 2))
                }
                ':' => {
                    let colons = consume_while(&mut input, |c| *c == ':');
                    if colons.len() == 1 {
                        let name = consume_while(&mut input, is_word);
                        if !name.is_empty() {
                            fragments.push(mem::take(&mut fragment));
                            names.push(name.to_string());
                            continue;
                        }
                    }
                    fragment.push_str(colons);
                }
                _ => {
                    fragment.push(c);
                    input = &input[c.len_utf8()..];
                }
            }
        }
        fragments.push(fragment);
        Self::from_parts(fragments, names)
    }

    fn from_parts(fragments: Vec<String>, names: Vec<String>) -> Self {
        debug_assert_eq!(fragments.len(), names.len() + 1);
        let sql = fragments.join("?");
        Self {
            fragments: fragments.into(),
            names: names.into(),
            sql,
        }
    }

    /// Driver ready SQL, using `?` markers.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Parameter names aligned with the markers, position `i + 1` is `names()[i]`.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn parameter_count(&self) -> usize {
        self.names.len()
    }

    /// Rebuilds the named form of the statement, `:ids[0], :ids[1]` after an expansion.
    pub fn named_sql(&self) -> String {
        let mut result = String::with_capacity(self.sql.len() * 2);
        for (fragment, name) in self.fragments.iter().zip(self.names.iter()) {
            result.push_str(fragment);
            result.push(':');
            result.push_str(name);
        }
        if let Some(last) = self.fragments.last() {
            result.push_str(last);
        }
        result
    }

    /// Replace every marker of a multi-valued parameter with one marker per value.
    ///
    /// The synthetic positions are named `name[0]`, `name[1]`, ... and are resolved by
    /// [`Parameters::resolve`] to the corresponding value. Returns the statement
    /// unchanged if no multi-valued parameter is used.
    pub fn expand(&self, parameters: &Parameters) -> Cow<'_, ParsedSql> {
        let multi = |name: &str| match parameters.get(name) {
            Some(Param::Multi(values)) => Some(values.len()),
            _ => None,
        };
        if !self.names.iter().any(|name| multi(name).is_some()) {
            return Cow::Borrowed(self);
        }
        let mut fragments = Vec::with_capacity(self.fragments.len());
        let mut names = Vec::with_capacity(self.names.len());
        let mut fragment = self.fragments[0].clone();
        for (i, name) in self.names.iter().enumerate() {
            match multi(name) {
                Some(count) => {
                    for n in 0..count {
                        if n > 0 {
                            fragment.push_str(", ");
                        }
                        fragments.push(mem::take(&mut fragment));
                        names.push(format!("{name}[{n}]"));
                    }
                }
                None => {
                    fragments.push(mem::take(&mut fragment));
                    names.push(name.clone());
                }
            }
            fragment.push_str(&self.fragments[i + 1]);
        }
        fragments.push(fragment);
        Cow::Owned(Self::from_parts(fragments, names))
    }
}

impl Display for ParsedSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

impl From<&str> for ParsedSql {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

#[cfg(test)]
mod tests {
    use super::ParsedSql;
    use crate::{NamedParam, Parameters};
    use indoc::indoc;

    #[test]
    fn simple() {
        let parsed = ParsedSql::parse("SELECT * FROM t WHERE id = :id AND id = :id");
        assert_eq!(parsed.sql(), "SELECT * FROM t WHERE id = ? AND id = ?");
        assert_eq!(parsed.names(), ["id", "id"]);
    }

    #[test]
    fn no_parameters() {
        let parsed = ParsedSql::parse("SELECT 1");
        assert_eq!(parsed.sql(), "SELECT 1");
        assert!(parsed.names().is_empty());
        let parsed = ParsedSql::parse("");
        assert_eq!(parsed.sql(), "");
        assert_eq!(parsed.named_sql(), "");
    }

    #[test]
    fn escaped() {
        let parsed = ParsedSql::parse("a ::x b");
        assert_eq!(parsed.sql(), "a ::x b");
        assert!(parsed.names().is_empty());
        let parsed = ParsedSql::parse("SELECT :v::text, :::w");
        assert_eq!(parsed.sql(), "SELECT ?::text, :::w");
        assert_eq!(parsed.names(), ["v"]);
    }

    #[test]
    fn lone_colon() {
        let parsed = ParsedSql::parse("SELECT ': ' || x, a : b, c:");
        assert_eq!(parsed.sql(), "SELECT ': ' || x, a : b, c:");
        assert!(parsed.names().is_empty());
    }

    #[test]
    fn quoted_and_comments() {
        let parsed = ParsedSql::parse(indoc! {r#"
            SELECT ':no', "col:umn", 'it''s :no', `x:y`
            -- :commented
            FROM t /* :also
            commented */ WHERE a=:a AND b IN(:b1,:b2)
        "#});
        assert_eq!(parsed.names(), ["a", "b1", "b2"]);
        assert_eq!(
            parsed.sql(),
            indoc! {r#"
                SELECT ':no', "col:umn", 'it''s :no', `x:y`
                -- :commented
                FROM t /* :also
                commented */ WHERE a=? AND b IN(?,?)
            "#}
        );
    }

    #[test]
    fn unterminated_literal() {
        let parsed = ParsedSql::parse("SELECT :a, 'oops :b");
        assert_eq!(parsed.names(), ["a"]);
        assert_eq!(parsed.sql(), "SELECT ?, 'oops :b");
    }

    #[test]
    fn unicode() {
        let parsed = ParsedSql::parse("SELECT 'π' AS \"ünï\", :ä, :名");
        assert!(parsed.names().is_empty());
        assert_eq!(parsed.sql(), "SELECT 'π' AS \"ünï\", :ä, :名");
        let parsed = ParsedSql::parse("SELECT 'π', :p_1 → done");
        assert_eq!(parsed.sql(), "SELECT 'π', ? → done");
        assert_eq!(parsed.names(), ["p_1"]);
    }

    #[test]
    fn idempotent() {
        let sql = "UPDATE t SET a = :a, b = ':b' WHERE c = :c";
        assert_eq!(ParsedSql::parse(sql), ParsedSql::parse(sql));
    }

    #[test]
    fn markers_match_names() {
        for sql in [
            "SELECT :a, :b, :a",
            "INSERT INTO t(x, y) VALUES(:x,:y)",
            ":start AND :end",
            "SELECT '?' , :a",
        ] {
            let parsed = ParsedSql::parse(sql);
            let markers = ParsedSql::parse(&parsed.named_sql());
            assert_eq!(markers.names(), parsed.names());
            assert_eq!(parsed.named_sql(), sql);
        }
    }

    #[test]
    fn expand() {
        let parsed = ParsedSql::parse("SELECT * FROM t WHERE id IN(:ids) AND kind = :kind;");
        let parameters = Parameters::new()
            .on(NamedParam::values("ids", [1, 2, 3, 4]).unwrap())
            .on(NamedParam::value("kind", "a"));
        let expanded = parsed.expand(&parameters);
        assert_eq!(
            expanded.sql(),
            "SELECT * FROM t WHERE id IN(?, ?, ?, ?) AND kind = ?;"
        );
        assert_eq!(
            expanded.names(),
            ["ids[0]", "ids[1]", "ids[2]", "ids[3]", "kind"]
        );
        assert_eq!(
            expanded.named_sql(),
            "SELECT * FROM t WHERE id IN(:ids[0], :ids[1], :ids[2], :ids[3]) AND kind = :kind;"
        );
        let parameters = Parameters::new().on(NamedParam::value("kind", "a"));
        assert!(matches!(
            parsed.expand(&parameters),
            std::borrow::Cow::Borrowed(..)
        ));
    }
}
