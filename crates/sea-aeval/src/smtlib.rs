//! A small SMT-LIB2 reader: enough of the s-expression syntax to list the
//! commands of a script and to find which declared constants its assertions
//! mention.

use std::collections::HashSet;

use thiserror::Error;
use winnow::combinator::{alt, cut_err, repeat};
use winnow::error::{ContextError, ErrMode};
use winnow::token::{literal, take_till, take_while};
use winnow::{ModalResult, Parser};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SExpr {
    Symbol(String),
    Keyword(String),
    /// Numerals, decimals and `#x`/`#b` constants, kept as written.
    Literal(String),
    String(String),
    List(Vec<SExpr>),
}

impl SExpr {
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            SExpr::Symbol(symbol) => Some(symbol),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SExpr]> {
        match self {
            SExpr::List(items) => Some(items),
            _ => None,
        }
    }

    fn head(&self) -> Option<&str> {
        self.as_list()?.first()?.as_symbol()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SmtParseError {
    #[error("line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("script has no `assert` command")]
    NoAssertions,
}

/// A declared zero-arity constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constant {
    pub name: String,
    pub sort: SExpr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub commands: Vec<SExpr>,
}

impl Script {
    /// Constants introduced by `declare-const` or by `declare-fun` with no
    /// arguments, in declaration order.
    pub fn constants(&self) -> Vec<Constant> {
        let mut constants: Vec<Constant> = Vec::new();
        for command in &self.commands {
            let Some(items) = command.as_list() else {
                continue;
            };
            let declared = match (command.head(), items) {
                (Some("declare-const"), [_, name, sort]) => name.as_symbol().zip(Some(sort)),
                (Some("declare-fun"), [_, name, SExpr::List(args), sort]) if args.is_empty() => {
                    name.as_symbol().zip(Some(sort))
                }
                _ => None,
            };
            if let Some((name, sort)) = declared {
                if constants.iter().all(|constant| constant.name != name) {
                    constants.push(Constant {
                        name: name.to_string(),
                        sort: sort.clone(),
                    });
                }
            }
        }
        constants
    }

    pub fn constant_sort(&self, name: &str) -> Option<SExpr> {
        self.constants()
            .into_iter()
            .find(|constant| constant.name == name)
            .map(|constant| constant.sort)
    }

    pub fn assertions(&self) -> impl Iterator<Item = &SExpr> {
        self.commands
            .iter()
            .filter(|command| command.head() == Some("assert"))
            .filter_map(|command| command.as_list()?.get(1))
    }

    /// Declared constants that occur free in some assertion, in declaration
    /// order. Symbols bound by `let`, `forall` or `exists` do not count.
    pub fn free_symbols(&self) -> Vec<String> {
        let constants = self.constants();
        let declared: HashSet<&str> = constants.iter().map(|c| c.name.as_str()).collect();
        let mut free = HashSet::new();
        for assertion in self.assertions() {
            collect_free(assertion, &declared, &mut Vec::new(), &mut free);
        }
        constants
            .into_iter()
            .map(|constant| constant.name)
            .filter(|name| free.contains(name))
            .collect()
    }
}

fn collect_free(
    expr: &SExpr,
    declared: &HashSet<&str>,
    bound: &mut Vec<String>,
    free: &mut HashSet<String>,
) {
    let items = match expr {
        SExpr::Symbol(symbol) => {
            if declared.contains(symbol.as_str()) && !bound.contains(symbol) {
                free.insert(symbol.clone());
            }
            return;
        }
        SExpr::List(items) => items,
        _ => return,
    };
    let binders = |list: Option<&SExpr>| -> Vec<(String, Option<SExpr>)> {
        list.and_then(SExpr::as_list)
            .unwrap_or_default()
            .iter()
            .filter_map(|binding| {
                let pair = binding.as_list()?;
                let name = pair.first()?.as_symbol()?.to_string();
                Some((name, pair.get(1).cloned()))
            })
            .collect()
    };
    match expr.head() {
        Some("let") => {
            let bindings = binders(items.get(1));
            // bindings are parallel: their terms see the outer scope
            for (_, term) in &bindings {
                if let Some(term) = term {
                    collect_free(term, declared, bound, free);
                }
            }
            let depth = bound.len();
            bound.extend(bindings.into_iter().map(|(name, _)| name));
            for body in items.iter().skip(2) {
                collect_free(body, declared, bound, free);
            }
            bound.truncate(depth);
        }
        Some("forall") | Some("exists") => {
            let depth = bound.len();
            bound.extend(binders(items.get(1)).into_iter().map(|(name, _)| name));
            for body in items.iter().skip(2) {
                collect_free(body, declared, bound, free);
            }
            bound.truncate(depth);
        }
        Some("!") => {
            if let Some(term) = items.get(1) {
                collect_free(term, declared, bound, free);
            }
        }
        _ => {
            for item in items {
                collect_free(item, declared, bound, free);
            }
        }
    }
}

pub fn parse_script(text: &str) -> Result<Script, SmtParseError> {
    let mut input = text;
    let commands: Vec<SExpr> = repeat(0.., sexpr)
        .parse_next(&mut input)
        .map_err(|err| syntax_error(text, input, err))?;
    ws.parse_next(&mut input)
        .map_err(|err| syntax_error(text, input, err))?;
    if !input.is_empty() {
        return Err(located(text, input, "unexpected `)`".to_string()));
    }
    let script = Script { commands };
    if script.assertions().next().is_none() {
        return Err(SmtParseError::NoAssertions);
    }
    Ok(script)
}

fn syntax_error(text: &str, rest: &str, err: ErrMode<ContextError>) -> SmtParseError {
    let message = match err {
        ErrMode::Cut(_) if rest.is_empty() => "unexpected end of input".to_string(),
        ErrMode::Backtrack(ctx) | ErrMode::Cut(ctx) => {
            let detail = ctx.to_string();
            if detail.is_empty() {
                "malformed s-expression".to_string()
            } else {
                detail
            }
        }
        ErrMode::Incomplete(_) => "incomplete input".to_string(),
    };
    located(text, rest, message)
}

fn located(text: &str, rest: &str, message: String) -> SmtParseError {
    let consumed = &text[..text.len() - rest.len()];
    let line = consumed.matches('\n').count() + 1;
    let column = consumed
        .rsplit('\n')
        .next()
        .map_or(0, |tail| tail.chars().count())
        + 1;
    SmtParseError::Syntax {
        line,
        column,
        message,
    }
}

fn ws(input: &mut &str) -> ModalResult<()> {
    repeat::<_, _, (), _, _>(0.., alt((whitespace, comment))).parse_next(input)?;
    Ok(())
}

fn whitespace(input: &mut &str) -> ModalResult<()> {
    take_while(1.., char::is_whitespace)
        .map(|_| ())
        .parse_next(input)
}

fn comment(input: &mut &str) -> ModalResult<()> {
    literal(";").parse_next(input)?;
    take_till(0.., |c: char| c == '\n').parse_next(input)?;
    Ok(())
}

fn sexpr(input: &mut &str) -> ModalResult<SExpr> {
    ws.parse_next(input)?;
    alt((list, quoted_symbol, string_literal, keyword, atom)).parse_next(input)
}

fn list(input: &mut &str) -> ModalResult<SExpr> {
    literal("(").parse_next(input)?;
    let items: Vec<SExpr> = repeat(0.., sexpr).parse_next(input)?;
    ws.parse_next(input)?;
    cut_err(literal(")")).parse_next(input)?;
    Ok(SExpr::List(items))
}

fn quoted_symbol(input: &mut &str) -> ModalResult<SExpr> {
    literal("|").parse_next(input)?;
    let symbol = take_till(0.., |c: char| c == '|').parse_next(input)?;
    cut_err(literal("|")).parse_next(input)?;
    Ok(SExpr::Symbol(symbol.to_string()))
}

/// String literals escape `"` by doubling it.
fn string_literal(input: &mut &str) -> ModalResult<SExpr> {
    literal("\"").parse_next(input)?;
    let mut value = String::new();
    loop {
        let chunk = take_till(0.., |c: char| c == '"').parse_next(input)?;
        value.push_str(chunk);
        cut_err(literal("\"")).parse_next(input)?;
        if let Some(rest) = input.strip_prefix('"') {
            *input = rest;
            value.push('"');
        } else {
            return Ok(SExpr::String(value));
        }
    }
}

fn keyword(input: &mut &str) -> ModalResult<SExpr> {
    literal(":").parse_next(input)?;
    let name = take_while(1.., is_symbol_char).parse_next(input)?;
    Ok(SExpr::Keyword(name.to_string()))
}

fn atom(input: &mut &str) -> ModalResult<SExpr> {
    let text = take_while(1.., is_symbol_char).parse_next(input)?;
    let literal_start = text.starts_with(|c: char| c.is_ascii_digit() || c == '#');
    Ok(if literal_start {
        SExpr::Literal(text.to_string())
    } else {
        SExpr::Symbol(text.to_string())
    })
}

fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '|' | '"' | ';')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_nested_lists_comments_and_literals() {
        let script = parse_script(
            "; header\n(set-info :status sat)\n(declare-fun |odd name| () Int)\n(assert (= |odd name| #x0f \"a\"\"b\"))\n",
        )
        .unwrap();
        assert_eq!(script.commands.len(), 3);
        assert_eq!(
            script.commands[0],
            SExpr::List(vec![
                SExpr::Symbol("set-info".to_string()),
                SExpr::Keyword("status".to_string()),
                SExpr::Symbol("sat".to_string()),
            ])
        );
        let assertion = script.assertions().next().unwrap();
        assert_eq!(
            assertion.as_list().unwrap()[2..],
            [
                SExpr::Literal("#x0f".to_string()),
                SExpr::String("a\"b".to_string()),
            ]
        );
        assert_eq!(script.free_symbols(), vec!["odd name"]);
    }

    #[test]
    fn binders_shadow_declared_constants() {
        let script = parse_script(
            "(declare-const x Int)
             (declare-const y Int)
             (declare-const z Int)
             (declare-fun f (Int) Int)
             (assert (forall ((y Int)) (> (f y) 0)))
             (assert (let ((z x)) (< z 3)))",
        )
        .unwrap();
        assert_eq!(script.free_symbols(), vec!["x"]);
        assert_eq!(script.constants().len(), 3);
    }

    #[test]
    fn reports_position_of_unclosed_list() {
        let err = parse_script("(declare-const x Int)\n(assert (> x 0)").unwrap_err();
        assert!(matches!(err, SmtParseError::Syntax { line: 2, .. }), "{}", err);
    }

    #[test]
    fn stray_close_paren_is_an_error() {
        let err = parse_script("(assert true))").unwrap_err();
        assert_eq!(
            err,
            SmtParseError::Syntax {
                line: 1,
                column: 14,
                message: "unexpected `)`".to_string(),
            }
        );
    }

    #[test]
    fn script_without_assertions_is_rejected() {
        assert_eq!(
            parse_script("(declare-const x Int)(check-sat)"),
            Err(SmtParseError::NoAssertions)
        );
    }
}
