//! A `nom`-based parser for the template expression language.

use crate::ast::*;
use crate::error::ExprError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, multispace0, one_of},
    combinator::{map, not, opt, recognize, value},
    multi::{many0, many1, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
};
use std::sync::Arc;

type Res<'a, O> = IResult<&'a str, O>;

const KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "else", "for", "lambda", "None", "True", "False",
];

// --- Main Public Parser ---

pub fn parse_expression(input: &str) -> Result<Expr, ExprError> {
    if input.trim().is_empty() {
        return Err(ExprError::parse(input, "empty expression"));
    }
    match expression(input) {
        Ok((rest, expr)) if rest.trim().is_empty() => Ok(expr),
        Ok((rest, _)) => Err(ExprError::parse(
            input,
            format!("Parser did not consume all input. Remainder: '{}'", rest.trim()),
        )),
        Err(e) => Err(ExprError::parse(input, e.to_string())),
    }
}

// --- Combinators & Helpers ---

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

fn fail<O>(input: &str, kind: nom::error::ErrorKind) -> Res<'_, O> {
    Err(nom::Err::Error(nom::error::Error::new(input, kind)))
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Matches a literal token, surrounded by optional whitespace.
fn sym<'a>(token: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    ws(move |input: &'a str| -> Res<'a, &'a str> { tag(token).parse(input) })
}

/// Matches a keyword that is not immediately followed by an identifier character.
fn kw<'a>(word: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    ws(move |input: &'a str| -> Res<'a, &'a str> {
        let (rest, matched) = tag(word).parse(input)?;
        if rest.chars().next().is_some_and(is_ident_char) {
            return fail(input, nom::error::ErrorKind::Tag);
        }
        Ok((rest, matched))
    })
}

fn identifier(input: &str) -> Res<'_, String> {
    let (rest, name) = recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(is_ident_char),
    ))
    .parse(input)?;
    if KEYWORDS.contains(&name) {
        return fail(input, nom::error::ErrorKind::Verify);
    }
    Ok((rest, name.to_string()))
}

fn fold_binary(first: Expr, rest: Vec<(BinaryOperator, Expr)>) -> Expr {
    rest.into_iter().fold(first, |left, (op, right)| Expr::Binary {
        left: Box::new(left),
        op,
        right: Box::new(right),
    })
}

// --- Expression Parsers (in order of precedence) ---

fn expression(input: &str) -> Res<'_, Expr> {
    alt((lambda_expr, conditional)).parse(input)
}

fn conditional(input: &str) -> Res<'_, Expr> {
    let (i, body) = or_test(input)?;
    let (i, branch) = opt(pair(preceded(kw("if"), or_test), preceded(kw("else"), expression))).parse(i)?;
    match branch {
        Some((test, orelse)) => Ok((
            i,
            Expr::Conditional {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            },
        )),
        None => Ok((i, body)),
    }
}

enum LambdaArg {
    Param(Param),
    VarArg(String),
    KwArg(String),
}

fn lambda_arg(input: &str) -> Res<'_, LambdaArg> {
    alt((
        map(preceded(sym("**"), ws(identifier)), LambdaArg::KwArg),
        map(preceded(sym("*"), ws(identifier)), LambdaArg::VarArg),
        map(
            pair(ws(identifier), opt(preceded(sym("="), conditional))),
            |(name, default)| LambdaArg::Param(Param { name, default }),
        ),
    ))
    .parse(input)
}

fn lambda_expr(input: &str) -> Res<'_, Expr> {
    let (i, _) = kw("lambda").parse(input)?;
    let (i, args) = opt(separated_list1(sym(","), lambda_arg)).parse(i)?;
    let (i, _) = sym(":").parse(i)?;
    let (i, body) = expression(i)?;

    let mut params = Vec::new();
    let mut vararg = None;
    let mut kwarg = None;
    for arg in args.unwrap_or_default() {
        match arg {
            LambdaArg::Param(p) if vararg.is_none() && kwarg.is_none() => params.push(p),
            LambdaArg::VarArg(name) if vararg.is_none() && kwarg.is_none() => vararg = Some(name),
            LambdaArg::KwArg(name) if kwarg.is_none() => kwarg = Some(name),
            _ => return fail(input, nom::error::ErrorKind::Verify),
        }
    }

    Ok((
        i,
        Expr::Lambda(Arc::new(LambdaDef {
            params,
            vararg,
            kwarg,
            body,
        })),
    ))
}

fn or_test(input: &str) -> Res<'_, Expr> {
    let (i, first) = and_test(input)?;
    let (i, rest) = many0(preceded(kw("or"), and_test)).parse(i)?;
    if rest.is_empty() {
        return Ok((i, first));
    }
    let mut values = vec![first];
    values.extend(rest);
    Ok((
        i,
        Expr::BoolOp {
            op: BoolOperator::Or,
            values,
        },
    ))
}

fn and_test(input: &str) -> Res<'_, Expr> {
    let (i, first) = not_test(input)?;
    let (i, rest) = many0(preceded(kw("and"), not_test)).parse(i)?;
    if rest.is_empty() {
        return Ok((i, first));
    }
    let mut values = vec![first];
    values.extend(rest);
    Ok((
        i,
        Expr::BoolOp {
            op: BoolOperator::And,
            values,
        },
    ))
}

fn not_test(input: &str) -> Res<'_, Expr> {
    alt((
        map(preceded(kw("not"), not_test), |operand| Expr::Unary {
            op: UnaryOperator::Not,
            operand: Box::new(operand),
        }),
        comparison,
    ))
    .parse(input)
}

fn compare_op(input: &str) -> Res<'_, CompareOperator> {
    alt((
        value(CompareOperator::NotIn, pair(kw("not"), kw("in"))),
        value(CompareOperator::IsNot, pair(kw("is"), kw("not"))),
        value(CompareOperator::In, kw("in")),
        value(CompareOperator::Is, kw("is")),
        value(CompareOperator::Eq, sym("==")),
        value(CompareOperator::NotEq, sym("!=")),
        value(CompareOperator::LtE, sym("<=")),
        value(CompareOperator::GtE, sym(">=")),
        value(CompareOperator::Lt, sym("<")),
        value(CompareOperator::Gt, sym(">")),
    ))
    .parse(input)
}

fn comparison(input: &str) -> Res<'_, Expr> {
    let (i, left) = arith(input)?;
    let (i, ops) = many0(pair(compare_op, arith)).parse(i)?;
    if ops.is_empty() {
        return Ok((i, left));
    }
    Ok((
        i,
        Expr::Compare {
            left: Box::new(left),
            ops,
        },
    ))
}

fn additive_op(input: &str) -> Res<'_, BinaryOperator> {
    alt((
        value(BinaryOperator::Add, sym("+")),
        value(BinaryOperator::Sub, sym("-")),
    ))
    .parse(input)
}

fn multiplicative_op(input: &str) -> Res<'_, BinaryOperator> {
    alt((
        value(BinaryOperator::FloorDiv, sym("//")),
        value(BinaryOperator::Div, sym("/")),
        value(BinaryOperator::Mod, sym("%")),
        value(BinaryOperator::Mul, ws(terminated(star, not(char('*'))))),
    ))
    .parse(input)
}

fn arith(input: &str) -> Res<'_, Expr> {
    let (i, first) = term(input)?;
    let (i, rest) = many0(pair(additive_op, term)).parse(i)?;
    Ok((i, fold_binary(first, rest)))
}

fn term(input: &str) -> Res<'_, Expr> {
    let (i, first) = factor(input)?;
    let (i, rest) = many0(pair(multiplicative_op, factor)).parse(i)?;
    Ok((i, fold_binary(first, rest)))
}

fn factor(input: &str) -> Res<'_, Expr> {
    alt((
        map(preceded(sym("-"), factor), |operand| Expr::Unary {
            op: UnaryOperator::Minus,
            operand: Box::new(operand),
        }),
        map(preceded(sym("+"), factor), |operand| Expr::Unary {
            op: UnaryOperator::Plus,
            operand: Box::new(operand),
        }),
        power,
    ))
    .parse(input)
}

fn power(input: &str) -> Res<'_, Expr> {
    let (i, base) = postfix(input)?;
    let (i, exponent) = opt(preceded(sym("**"), factor)).parse(i)?;
    match exponent {
        Some(exp) => Ok((
            i,
            Expr::Binary {
                left: Box::new(base),
                op: BinaryOperator::Pow,
                right: Box::new(exp),
            },
        )),
        None => Ok((i, base)),
    }
}

// --- Postfix: attribute access, calls, subscripts ---

enum Trailer {
    Attr(String),
    Call(Vec<Expr>, Vec<(String, Expr)>),
    Index(Index),
}

fn postfix(input: &str) -> Res<'_, Expr> {
    let (i, base) = atom(input)?;
    let (i, trailers) = many0(trailer).parse(i)?;
    let expr = trailers.into_iter().fold(base, |value, t| match t {
        Trailer::Attr(attr) => Expr::Attribute {
            value: Box::new(value),
            attr,
        },
        Trailer::Call(args, kwargs) => Expr::Call {
            func: Box::new(value),
            args,
            kwargs,
        },
        Trailer::Index(index) => Expr::Subscript {
            value: Box::new(value),
            index: Box::new(index),
        },
    });
    Ok((i, expr))
}

fn trailer(input: &str) -> Res<'_, Trailer> {
    alt((
        map(preceded(sym("."), ws(identifier)), Trailer::Attr),
        map(delimited(sym("("), call_args, sym(")")), |(args, kwargs)| {
            Trailer::Call(args, kwargs)
        }),
        map(delimited(sym("["), subscript, sym("]")), Trailer::Index),
    ))
    .parse(input)
}

enum CallArg {
    Positional(Expr),
    Keyword(String, Expr),
}

fn star(input: &str) -> Res<'_, &str> {
    tag("*").parse(input)
}

fn equals(input: &str) -> Res<'_, &str> {
    tag("=").parse(input)
}

fn keyword_assign(input: &str) -> Res<'_, &str> {
    ws(terminated(equals, not(char('=')))).parse(input)
}

fn call_arg(input: &str) -> Res<'_, CallArg> {
    alt((
        map(pair(ws(identifier), preceded(keyword_assign, expression)), |(name, expr)| {
            CallArg::Keyword(name, expr)
        }),
        map(expression, CallArg::Positional),
    ))
    .parse(input)
}

fn call_args(input: &str) -> Res<'_, (Vec<Expr>, Vec<(String, Expr)>)> {
    let (i, first) = opt(call_arg).parse(input)?;
    let Some(first) = first else {
        return Ok((i, (Vec::new(), Vec::new())));
    };

    // A lone generator expression argument: `sum(x for x in xs)`.
    if let CallArg::Positional(element) = &first
        && let Ok((after, generators)) = many1(comp_clause).parse(i)
    {
        let genexp = Expr::ListComp {
            element: Box::new(element.clone()),
            generators,
        };
        return Ok((after, (vec![genexp], Vec::new())));
    }

    let (i, rest) = many0(preceded(sym(","), call_arg)).parse(i)?;
    let (i, _) = opt(sym(",")).parse(i)?;

    let mut args = Vec::new();
    let mut kwargs = Vec::new();
    for arg in std::iter::once(first).chain(rest) {
        match arg {
            CallArg::Positional(expr) if kwargs.is_empty() => args.push(expr),
            CallArg::Keyword(name, expr) => kwargs.push((name, expr)),
            CallArg::Positional(_) => return fail(input, nom::error::ErrorKind::Verify),
        }
    }
    Ok((i, (args, kwargs)))
}

fn subscript(input: &str) -> Res<'_, Index> {
    alt((slice, map(expression, Index::Item))).parse(input)
}

fn slice(input: &str) -> Res<'_, Index> {
    let (i, lower) = opt(expression).parse(input)?;
    let (i, _) = sym(":").parse(i)?;
    let (i, upper) = opt(expression).parse(i)?;
    let (i, step) = opt(preceded(sym(":"), opt(expression))).parse(i)?;
    Ok((
        i,
        Index::Slice {
            lower,
            upper,
            step: step.flatten(),
        },
    ))
}

// --- Comprehensions ---

fn target_names(input: &str) -> Res<'_, Vec<String>> {
    separated_list1(sym(","), ws(identifier)).parse(input)
}

fn target(input: &str) -> Res<'_, Target> {
    alt((
        map(delimited(sym("("), target_names, sym(")")), Target::Tuple),
        map(target_names, |mut names: Vec<String>| {
            if names.len() == 1 {
                Target::Name(names.remove(0))
            } else {
                Target::Tuple(names)
            }
        }),
    ))
    .parse(input)
}

fn comp_clause(input: &str) -> Res<'_, Comprehension> {
    let (i, _) = kw("for").parse(input)?;
    let (i, target) = target(i)?;
    let (i, _) = kw("in").parse(i)?;
    let (i, iter) = or_test(i)?;
    let (i, conditions) = many0(preceded(kw("if"), or_test)).parse(i)?;
    Ok((
        i,
        Comprehension {
            target,
            iter,
            conditions,
        },
    ))
}

// --- Atoms ---

fn atom(input: &str) -> Res<'_, Expr> {
    ws(alt((
        paren_atom,
        list_atom,
        dict_atom,
        number,
        map(many1(ws(string_literal)), |parts| {
            Expr::Literal(Literal::Str(parts.concat()))
        }),
        value(Expr::Literal(Literal::None), kw("None")),
        value(Expr::Literal(Literal::Bool(true)), kw("True")),
        value(Expr::Literal(Literal::Bool(false)), kw("False")),
        map(identifier, Expr::Name),
    )))
    .parse(input)
}

fn paren_atom(input: &str) -> Res<'_, Expr> {
    let (i, _) = sym("(").parse(input)?;
    if let Ok((i, _)) = sym(")").parse(i) {
        return Ok((i, Expr::Tuple(Vec::new())));
    }
    let (i, first) = expression(i)?;
    if let Ok((i, generators)) = many1(comp_clause).parse(i) {
        let (i, _) = sym(")").parse(i)?;
        return Ok((
            i,
            Expr::ListComp {
                element: Box::new(first),
                generators,
            },
        ));
    }
    let (i, rest) = many0(preceded(sym(","), expression)).parse(i)?;
    let (i, trailing) = opt(sym(",")).parse(i)?;
    let (i, _) = sym(")").parse(i)?;
    if rest.is_empty() && trailing.is_none() {
        return Ok((i, first));
    }
    let mut items = vec![first];
    items.extend(rest);
    Ok((i, Expr::Tuple(items)))
}

fn list_atom(input: &str) -> Res<'_, Expr> {
    let (i, _) = sym("[").parse(input)?;
    if let Ok((i, _)) = sym("]").parse(i) {
        return Ok((i, Expr::List(Vec::new())));
    }
    let (i, first) = expression(i)?;
    if let Ok((i, generators)) = many1(comp_clause).parse(i) {
        let (i, _) = sym("]").parse(i)?;
        return Ok((
            i,
            Expr::ListComp {
                element: Box::new(first),
                generators,
            },
        ));
    }
    let (i, rest) = many0(preceded(sym(","), expression)).parse(i)?;
    let (i, _) = opt(sym(",")).parse(i)?;
    let (i, _) = sym("]").parse(i)?;
    let mut items = vec![first];
    items.extend(rest);
    Ok((i, Expr::List(items)))
}

fn dict_entry(input: &str) -> Res<'_, (Expr, Expr)> {
    pair(expression, preceded(sym(":"), expression)).parse(input)
}

fn dict_atom(input: &str) -> Res<'_, Expr> {
    let (i, _) = sym("{").parse(input)?;
    if let Ok((i, _)) = sym("}").parse(i) {
        return Ok((i, Expr::Dict(Vec::new())));
    }
    let (i, (key, val)) = dict_entry(i)?;
    if let Ok((i, generators)) = many1(comp_clause).parse(i) {
        let (i, _) = sym("}").parse(i)?;
        return Ok((
            i,
            Expr::DictComp {
                key: Box::new(key),
                value: Box::new(val),
                generators,
            },
        ));
    }
    let (i, rest) = many0(preceded(sym(","), dict_entry)).parse(i)?;
    let (i, _) = opt(sym(",")).parse(i)?;
    let (i, _) = sym("}").parse(i)?;
    let mut entries = vec![(key, val)];
    entries.extend(rest);
    Ok((i, Expr::Dict(entries)))
}

// --- Literal Parsers ---

fn number(input: &str) -> Res<'_, Expr> {
    let mantissa = alt((
        recognize(pair(digit1, opt(pair(char('.'), digit0)))),
        recognize(pair(char('.'), digit1)),
    ));
    let exponent = opt(pair(one_of("eE"), pair(opt(one_of("+-")), digit1)));
    let (i, text) = recognize(pair(mantissa, exponent)).parse(input)?;
    if i.chars().next().is_some_and(is_ident_char) {
        return fail(input, nom::error::ErrorKind::Digit);
    }
    if text.contains(['.', 'e', 'E']) {
        match text.parse::<f64>() {
            Ok(f) => Ok((i, Expr::Literal(Literal::Float(f)))),
            Err(_) => fail(input, nom::error::ErrorKind::Float),
        }
    } else {
        match text.parse::<i64>() {
            Ok(n) => Ok((i, Expr::Literal(Literal::Int(n)))),
            Err(_) => fail(input, nom::error::ErrorKind::Digit),
        }
    }
}

fn string_literal(input: &str) -> Res<'_, String> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, c @ ('\'' | '"'))) => c,
        _ => return fail(input, nom::error::ErrorKind::Char),
    };
    let mut out = String::new();
    while let Some((idx, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((&input[idx + c.len_utf8()..], out)),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, '0')) => out.push('\0'),
                Some((_, e @ ('\\' | '\'' | '"'))) => out.push(e),
                Some((_, other)) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            },
            c => out.push(c),
        }
    }
    fail(input, nom::error::ErrorKind::Char)
}
