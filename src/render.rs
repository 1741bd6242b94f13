// Copyright (C) 2022-2026 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of tracing-gelf-handler.
//
// tracing-gelf-handler is free software: you can redistribute it and/or modify it under the terms
// of the GNU General Public License as published by the Free Software Foundation, either version 3
// of the License, or (at your option) any later version.
//
// mpdpopm is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even
// the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details.
//
// You should have received a copy of the GNU General Public License along with mpdpopm.  If not,
// see <http://www.gnu.org/licenses/>.
//! Rendering a [`LogRecord`] to text.
//!
//! Callers may write their messages in either of two styles: `"user {0} logged in"` or
//! `"retry %d of %d"`, and we have no way of knowing which they meant. So we try the
//! positional-template style first, and if that leaves the message unchanged, try the printf
//! style on the raw message. This is a heuristic, and a message that legitimately contains
//! `{0}` or `%d` as literal text will be mangled; it's retained for compatibility with existing
//! message formats.
//!
//! Neither substitution style is allowed to keep a record from being delivered: on failure we
//! fall back to the least-transformed text we have.

use crate::{
    error::{Error, ErrorClass, ErrorSink},
    record::{LogRecord, Param},
};

use backtrace::Backtrace;

type StdResult<T, E> = std::result::Result<T, E>;

/// Messages longer than this many characters are truncated for the GELF `short_message`.
pub const MAX_SHORT_MESSAGE_LENGTH: usize = 250;

/// Placed between the message & the rendered trace of an attached error in `full_message`.
pub const TRACE_SEPARATOR: &str = "\n\r";

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                      substitution errors                                       //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Why a substitution attempt failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubstitutionError {
    /// A parameter couldn't satisfy a printf conversion (e.g. `%d` given a string). This is an
    /// expected outcome of the two-style heuristic, not a defect worth reporting.
    Conversion { conversion: char, param: String },
    /// The message was malformed in the style being tried, or named a missing parameter.
    Syntax { reason: String },
}

impl std::fmt::Display for SubstitutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        match self {
            SubstitutionError::Conversion { conversion, param } => {
                write!(f, "%{} can't format {}", conversion, param)
            }
            SubstitutionError::Syntax { reason } => write!(f, "{}", reason),
        }
    }
}

impl std::error::Error for SubstitutionError {}

fn syntax<T, S: Into<String>>(reason: S) -> StdResult<T, SubstitutionError> {
    Err(SubstitutionError::Syntax {
        reason: reason.into(),
    })
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                     `{0}`-style templates                                      //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Find the `}` closing a placeholder whose body begins at the start of `s`; return its byte
/// offset. Sub-format patterns may themselves contain braces (and quoted braces), so track both.
fn placeholder_end(s: &str) -> Option<usize> {
    let mut depth = 1;
    let mut quoted = false;
    for (i, c) in s.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '{' if !quoted => depth += 1,
            '}' if !quoted => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => (),
        }
    }
    None
}

/// Replace `{n}` (or `{n,anything}`) with the `n`th parameter.
///
/// References to parameters that weren't supplied are left in place, verbatim. An unterminated
/// `{`, or a placeholder whose index isn't a number, is an error.
///
/// Single quotes quote: `'{0}'` is the literal text `{0}` and `''` is one apostrophe. A quote
/// left open runs to the end of the message. The quotes themselves are dropped, so `"it's {0}"`
/// renders as `"its {0}"`.
pub fn substitute_template(
    message: &str,
    params: &[Param],
) -> StdResult<String, SubstitutionError> {
    let mut out = String::with_capacity(message.len());
    let mut quoted = false;
    let mut chars = message.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' => {
                if let Some((_, '\'')) = chars.peek() {
                    chars.next();
                    out.push('\'');
                } else {
                    quoted = !quoted;
                }
            }
            '{' if !quoted => {
                let after = &message[i + 1..];
                let close = match placeholder_end(after) {
                    Some(close) => close,
                    None => return syntax("unmatched braces in the pattern"),
                };
                let body = &after[..close];
                let index = body.split(',').next().unwrap_or("").trim();
                let index: usize = match index.parse() {
                    Ok(index) => index,
                    Err(_) => return syntax(format!("can't parse argument number: {}", index)),
                };
                match params.get(index) {
                    Some(param) => out.push_str(&param.to_string()),
                    None => {
                        out.push('{');
                        out.push_str(body);
                        out.push('}');
                    }
                }
                // Skip past the closing brace.
                let next = i + 1 + close + 1;
                while chars.next_if(|(j, _)| *j < next).is_some() {}
            }
            _ => out.push(c),
        }
    }
    Ok(out)
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                      `%s`-style templates                                      //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Copy, Clone, Debug, PartialEq)]
enum ArgIndex {
    Ordinary,
    Explicit(usize),
    Previous,
}

/// A parsed `%[index$][flags][width][.precision]conversion` specifier.
#[derive(Clone, Debug, Default, PartialEq)]
struct Spec {
    index: Option<ArgIndex>,
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    width: Option<usize>,
    precision: Option<usize>,
    conversion: char,
}

fn take_digits(s: &str) -> (&str, &str) {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s.split_at(end)
}

/// Widths & precisions beyond this are rejected rather than allocated.
pub const MAX_FIELD_WIDTH: usize = 65536;

fn bounded(digits: &str, what: &str) -> StdResult<usize, SubstitutionError> {
    match digits.parse::<usize>() {
        Ok(n) if n <= MAX_FIELD_WIDTH => Ok(n),
        _ => syntax(format!("{} {} exceeds {}", what, digits, MAX_FIELD_WIDTH)),
    }
}

/// Parse a specifier from `s` (which begins just after the `%`); return it along with the
/// number of bytes consumed.
fn parse_spec(s: &str) -> StdResult<(Spec, usize), SubstitutionError> {
    let mut spec = Spec::default();
    let mut rest = s;

    let (digits, after) = take_digits(rest);
    if !digits.is_empty() && after.starts_with('$') {
        let n: usize = digits.parse().unwrap_or(0);
        if n == 0 {
            return syntax(format!("illegal format argument index {}", digits));
        }
        spec.index = Some(ArgIndex::Explicit(n - 1));
        rest = &after[1..];
    } else if let Some(after) = rest.strip_prefix('<') {
        spec.index = Some(ArgIndex::Previous);
        rest = after;
    }

    while let Some(c) = rest.chars().next() {
        match c {
            '-' => spec.left = true,
            '0' => spec.zero = true,
            '+' => spec.plus = true,
            ' ' => spec.space = true,
            '#' | ',' | '(' => (),
            _ => break,
        }
        rest = &rest[1..];
    }

    let (digits, after) = take_digits(rest);
    if !digits.is_empty() {
        spec.width = Some(bounded(digits, "width")?);
        rest = after;
    }

    if let Some(after) = rest.strip_prefix('.') {
        let (digits, after) = take_digits(after);
        if digits.is_empty() {
            return syntax("precision with no digits");
        }
        spec.precision = Some(bounded(digits, "precision")?);
        rest = after;
    }

    match rest.chars().next() {
        Some(c) => {
            spec.conversion = c;
            Ok((spec, s.len() - rest.len() + c.len_utf8()))
        }
        None => syntax("format specifier with no conversion"),
    }
}

fn mismatch<T>(spec: &Spec, param: &Param) -> StdResult<T, SubstitutionError> {
    Err(SubstitutionError::Conversion {
        conversion: spec.conversion,
        param: format!("{:?}", param),
    })
}

/// Pad `body` (preceded by `sign`) out to the specifier's width.
fn justify(spec: &Spec, sign: &str, body: &str, numeric: bool) -> String {
    let len = sign.chars().count() + body.chars().count();
    let width = spec.width.unwrap_or(0);
    if len >= width {
        return format!("{}{}", sign, body);
    }
    let pad = width - len;
    if spec.left {
        format!("{}{}{}", sign, body, " ".repeat(pad))
    } else if spec.zero && numeric {
        format!("{}{}{}", sign, "0".repeat(pad), body)
    } else {
        format!("{}{}{}", " ".repeat(pad), sign, body)
    }
}

fn sign_of(spec: &Spec, negative: bool) -> &'static str {
    if negative {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    }
}

/// Render `x` in scientific notation, with a signed, two-digit (at least) exponent.
fn scientific(x: f64, precision: usize) -> String {
    let text = format!("{:.*e}", precision, x);
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => text,
    }
}

fn format_arg(spec: &Spec, param: &Param) -> StdResult<String, SubstitutionError> {
    let conversion = spec.conversion.to_ascii_lowercase();
    // Everything but %b renders a missing value as "null".
    if *param == Param::Null && conversion != 'b' {
        return Ok(justify(spec, "", "null", false));
    }
    let text = match conversion {
        'b' => {
            let b = match param {
                Param::Null => false,
                Param::Bool(b) => *b,
                _ => true,
            };
            justify(spec, "", &b.to_string(), false)
        }
        's' => {
            let mut body = param.to_string();
            if let Some(precision) = spec.precision {
                body = body.chars().take(precision).collect();
            }
            justify(spec, "", &body, false)
        }
        'c' => {
            let c = match param {
                Param::Char(c) => *c,
                Param::Int(i) => match u32::try_from(*i).ok().and_then(char::from_u32) {
                    Some(c) => c,
                    None => return mismatch(spec, param),
                },
                Param::UInt(u) => match u32::try_from(*u).ok().and_then(char::from_u32) {
                    Some(c) => c,
                    None => return mismatch(spec, param),
                },
                _ => return mismatch(spec, param),
            };
            justify(spec, "", &c.to_string(), false)
        }
        'd' => {
            let (negative, body) = match param {
                Param::Int(i) => (*i < 0, i.unsigned_abs().to_string()),
                Param::UInt(u) => (false, u.to_string()),
                _ => return mismatch(spec, param),
            };
            justify(spec, sign_of(spec, negative), &body, true)
        }
        'x' | 'o' => {
            let body = match (param, conversion) {
                (Param::Int(i), 'x') => format!("{:x}", i),
                (Param::Int(i), _) => format!("{:o}", i),
                (Param::UInt(u), 'x') => format!("{:x}", u),
                (Param::UInt(u), _) => format!("{:o}", u),
                _ => return mismatch(spec, param),
            };
            justify(spec, "", &body, true)
        }
        'f' | 'e' => {
            let x = match param {
                Param::Float(x) => *x,
                _ => return mismatch(spec, param),
            };
            if x.is_nan() {
                justify(spec, "", "NaN", false)
            } else if x.is_infinite() {
                justify(spec, sign_of(spec, x < 0.0), "Infinity", false)
            } else {
                let precision = spec.precision.unwrap_or(6);
                let body = if conversion == 'f' {
                    format!("{:.*}", precision, x.abs())
                } else {
                    scientific(x.abs(), precision)
                };
                justify(spec, sign_of(spec, x.is_sign_negative()), &body, true)
            }
        }
        _ => return syntax(format!("unknown format conversion '{}'", spec.conversion)),
    };
    Ok(if spec.conversion.is_ascii_uppercase() {
        text.to_uppercase()
    } else {
        text
    })
}

/// Substitute `params` into `message` according to printf-style specifiers (`%s`, `%5.2f`,
/// `%2$d`, `%%` & so forth).
///
/// A parameter whose type can't satisfy its conversion yields
/// [`SubstitutionError::Conversion`]; a malformed specifier, an unknown conversion, or a reference
/// to a missing parameter yields [`SubstitutionError::Syntax`]. Surplus parameters are ignored.
pub fn substitute_printf(message: &str, params: &[Param]) -> StdResult<String, SubstitutionError> {
    let mut out = String::with_capacity(message.len());
    let mut rest = message;
    let mut ordinary = 0;
    let mut previous: Option<usize> = None;
    while let Some(pct) = rest.find('%') {
        out.push_str(&rest[..pct]);
        let (spec, consumed) = parse_spec(&rest[pct + 1..])?;
        rest = &rest[pct + 1 + consumed..];
        match spec.conversion {
            '%' => {
                out.push_str(&justify(&spec, "", "%", false));
                continue;
            }
            'n' => {
                out.push('\n');
                continue;
            }
            _ => (),
        }
        let index = match spec.index.unwrap_or(ArgIndex::Ordinary) {
            ArgIndex::Ordinary => {
                ordinary += 1;
                ordinary - 1
            }
            ArgIndex::Explicit(n) => n,
            ArgIndex::Previous => match previous {
                Some(n) => n,
                None => return syntax("'%<' with no previous argument"),
            },
        };
        let param = match params.get(index) {
            Some(param) => param,
            None => return syntax(format!("no parameter for specifier #{}", index + 1)),
        };
        previous = Some(index);
        out.push_str(&format_arg(&spec, param)?);
    }
    out.push_str(rest);
    Ok(out)
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                         struct Renderer                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Bound `message` for use as a GELF `short_message`: anything longer than
/// [`MAX_SHORT_MESSAGE_LENGTH`] characters is cut to its first `MAX_SHORT_MESSAGE_LENGTH - 1`.
pub fn truncate(message: &str) -> String {
    if message.chars().count() > MAX_SHORT_MESSAGE_LENGTH {
        message
            .chars()
            .take(MAX_SHORT_MESSAGE_LENGTH - 1)
            .collect()
    } else {
        message.to_owned()
    }
}

/// The two textual renditions of a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rendered {
    pub short_message: String,
    pub full_message: String,
}

/// Turns [`LogRecord`]s into [`Rendered`] text.
#[derive(Clone, Debug, Default)]
pub struct Renderer {
    extract_stacktrace: bool,
}

impl Renderer {
    pub fn new(extract_stacktrace: bool) -> Renderer {
        Renderer { extract_stacktrace }
    }

    /// Produce the record's message text, with any parameters substituted.
    ///
    /// Substitution failures other than printf conversion mismatches are reported to `sink`.
    pub fn render_message(&self, record: &dyn LogRecord, sink: &dyn ErrorSink) -> String {
        if let Some(formatted) = record.formatted_message() {
            return formatted.to_owned();
        }

        let raw = record.message().unwrap_or("");
        let params = record.parameters();
        if params.is_empty() {
            return raw.to_owned();
        }

        let result = substitute_template(raw, params).and_then(|text| {
            if text != raw {
                Ok(text)
            } else {
                substitute_printf(raw, params)
            }
        });
        match result {
            Ok(text) => text,
            Err(SubstitutionError::Conversion { .. }) => raw.to_owned(),
            Err(SubstitutionError::Syntax { reason }) => {
                sink.report(
                    "Could not substitute parameters into the log message",
                    Some(&Error::Format {
                        message: raw.to_owned(),
                        reason,
                        back: Backtrace::new(),
                    }),
                    ErrorClass::Format,
                );
                raw.to_owned()
            }
        }
    }

    /// Render `record` in full.
    ///
    /// `short_message` is computed before any trace is appended to `full_message`.
    pub fn render(&self, record: &dyn LogRecord, sink: &dyn ErrorSink) -> Rendered {
        let mut full_message = self.render_message(record, sink);
        let short_message = truncate(&full_message);
        if self.extract_stacktrace {
            if let Some(error) = record.error() {
                full_message.push_str(TRACE_SEPARATOR);
                full_message.push_str(&error.to_string());
            }
        }
        Rendered {
            short_message,
            full_message,
        }
    }
}

#[cfg(test)]
mod test {

    use super::*;

    use crate::{
        record::{ErrorReport, Record},
        severity::SourceLevel,
    };

    use std::sync::Mutex;

    #[derive(Default)]
    struct Reports(Mutex<Vec<(String, ErrorClass)>>);

    impl ErrorSink for Reports {
        fn report(&self, msg: &str, _cause: Option<&Error>, class: ErrorClass) {
            self.0.lock().unwrap().push((msg.to_owned(), class));
        }
    }

    impl Reports {
        fn count(&self) -> usize {
            self.0.lock().unwrap().len()
        }
    }

    fn s(x: &str) -> Param {
        Param::from(x)
    }

    fn i(x: i64) -> Param {
        Param::Int(x)
    }

    fn f(x: f64) -> Param {
        Param::Float(x)
    }

    fn render(record: Record) -> (String, usize) {
        let sink = Reports::default();
        let text = Renderer::default().render_message(&record, &sink);
        (text, sink.count())
    }

    #[test]
    fn template_style() {
        let record = Record::new(SourceLevel::Info, "user {0} logged in").param("alice");
        assert_eq!(render(record), ("user alice logged in".to_owned(), 0));

        assert_eq!(
            substitute_template("{1} before {0}, {0,number}", &[s("a"), i(2)]),
            Ok("2 before a, a".to_owned())
        );
        // Missing parameters are left alone
        assert_eq!(
            substitute_template("{0} and {3}", &[s("a")]),
            Ok("a and {3}".to_owned())
        );
        assert!(substitute_template("oops {0", &[s("a")]).is_err());
        assert!(substitute_template("oops {zero}", &[s("a")]).is_err());
        assert_eq!(substitute_template("no braces } here", &[]), Ok("no braces } here".to_owned()));
    }

    #[test]
    fn printf_style() {
        let record = Record::new(SourceLevel::Info, "retry %d of %d").params([1i64, 5]);
        assert_eq!(render(record), ("retry 1 of 5".to_owned(), 0));

        let p = |fmt: &str, params: &[Param]| substitute_printf(fmt, params).unwrap();
        assert_eq!(
            p("%s|%5s|%-5s|%.2s", &[s("ab"), s("cd"), s("ef"), s("ghi")]),
            "ab|   cd|ef   |gh"
        );
        assert_eq!(p("%05d %+d % d %d", &[i(42), i(7), i(7), i(-3)]), "00042 +7  7 -3");
        assert_eq!(p("%x %X %o", &[i(255), i(255), i(8)]), "ff FF 10");
        assert_eq!(p("%.2f %8.3f %f", &[f(1.23456), f(-2.5), f(1.0)]), "1.23   -2.500 1.000000");
        assert_eq!(p("%e %.1E", &[f(12345.678), f(0.00012)]), "1.234568e+04 1.2E-04");
        assert_eq!(p("%b %b %B", &[Param::Bool(true), Param::Null, s("x")]), "true false TRUE");
        assert_eq!(p("%c%c", &[Param::Char('o'), i(107)]), "ok");
        assert_eq!(p("%2$s %1$s %<s", &[s("a"), s("b")]), "b a a");
        assert_eq!(p("100%% %s%n", &[Param::Null]), "100% null\n");
        assert_eq!(p("%S", &[s("shout")]), "SHOUT");
        // Surplus parameters are ignored
        assert_eq!(p("%s", &[s("a"), s("b")]), "a");
    }

    #[test]
    fn printf_conversion_mismatch_reverts_silently() {
        let record = Record::new(SourceLevel::Info, "count %d").param("many");
        assert_eq!(render(record), ("count %d".to_owned(), 0));

        let record = Record::new(SourceLevel::Info, "ratio %f").param(3i64);
        assert_eq!(render(record), ("ratio %f".to_owned(), 0));

        assert!(matches!(
            substitute_printf("%d", &[f(1.5)]),
            Err(SubstitutionError::Conversion { conversion: 'd', .. })
        ));
    }

    #[test]
    fn other_failures_are_reported() {
        // Unknown conversion
        let record = Record::new(SourceLevel::Info, "value %q").param(1i64);
        assert_eq!(render(record), ("value %q".to_owned(), 1));
        // Not enough parameters
        let record = Record::new(SourceLevel::Info, "%s and %s").param(1i64);
        assert_eq!(render(record), ("%s and %s".to_owned(), 1));
        // Malformed template
        let record = Record::new(SourceLevel::Info, "{who} did %s").param("it");
        assert_eq!(render(record), ("{who} did %s".to_owned(), 1));
        // Dangling '%'
        let record = Record::new(SourceLevel::Info, "100%").param(1i64);
        assert_eq!(render(record), ("100%".to_owned(), 1));
    }

    #[test]
    fn oversized_fields_are_rejected() {
        // Neither of these may be allocated; each falls back to the raw message & is reported.
        let record = Record::new(SourceLevel::Info, "id %9999999999999999999s").param("x");
        assert_eq!(render(record), ("id %9999999999999999999s".to_owned(), 1));
        let record = Record::new(SourceLevel::Info, "pi is %.4294967296f").param(1.5f64);
        assert_eq!(render(record), ("pi is %.4294967296f".to_owned(), 1));
        // Widths overflowing `usize` are rejected the same way.
        assert!(matches!(
            substitute_printf("%99999999999999999999999s", &[s("x")]),
            Err(SubstitutionError::Syntax { .. })
        ));

        let p = |fmt: &str| substitute_printf(fmt, &[s("x")]).unwrap();
        assert_eq!(p(&format!("%{}s", MAX_FIELD_WIDTH)).len(), MAX_FIELD_WIDTH);
        assert!(substitute_printf(&format!("%{}s", MAX_FIELD_WIDTH + 1), &[s("x")]).is_err());
    }

    #[test]
    fn quoting() {
        assert_eq!(
            substitute_template("'{0}' is {0}", &[s("a")]),
            Ok("{0} is a".to_owned())
        );
        assert_eq!(
            substitute_template("it''s {0}", &[s("a")]),
            Ok("it's a".to_owned())
        );
        // An unterminated quote runs to the end of the message
        assert_eq!(
            substitute_template("don't {0}", &[s("a")]),
            Ok("dont {0}".to_owned())
        );
        // Quoted braces inside a sub-format don't count
        assert_eq!(
            substitute_template("{0,choice,'}'} ok", &[s("a")]),
            Ok("a ok".to_owned())
        );

        // Dropping the apostrophe changes the text, so the printf style isn't tried.
        let record = Record::new(SourceLevel::Info, "it's %s").param("late");
        assert_eq!(render(record), ("its %s".to_owned(), 0));
        let record = Record::new(SourceLevel::Info, "retry %d").param(2i64);
        assert_eq!(render(record), ("retry 2".to_owned(), 0));
    }

    #[test]
    fn no_parameters_no_substitution() {
        let record = Record::new(SourceLevel::Info, "100% {0} literal");
        assert_eq!(render(record), ("100% {0} literal".to_owned(), 0));
        assert_eq!(render(Record::empty(SourceLevel::Info)), (String::new(), 0));
        let record = Record::preformatted(SourceLevel::Info, "done {0}").param("x");
        assert_eq!(render(record), ("done {0}".to_owned(), 0));
    }

    #[test]
    fn truncation() {
        let exact = "x".repeat(MAX_SHORT_MESSAGE_LENGTH);
        assert_eq!(truncate(&exact), exact);
        assert_eq!(truncate("short"), "short");

        let long = "y".repeat(MAX_SHORT_MESSAGE_LENGTH + 1);
        let short = truncate(&long);
        assert_eq!(short.chars().count(), 249);
        assert_eq!(short, long[..249]);

        // Characters, not bytes
        let wide = "世".repeat(300);
        assert_eq!(truncate(&wide), "世".repeat(249));
    }

    #[derive(Debug)]
    struct Boom;
    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "boom")
        }
    }
    impl std::error::Error for Boom {}

    #[test]
    fn stack_traces() {
        let sink = Reports::default();
        let message = "z".repeat(300);
        let record =
            Record::new(SourceLevel::Severe, message.clone()).error(ErrorReport::new(&Boom));

        let rendered = Renderer::new(true).render(&record, &sink);
        assert_eq!(rendered.short_message, message[..249]);
        assert_eq!(rendered.full_message, format!("{}\n\rboom\n", message));

        let rendered = Renderer::new(false).render(&record, &sink);
        assert_eq!(rendered.full_message, message);

        let rendered = Renderer::new(true).render(&Record::new(SourceLevel::Info, "hi"), &sink);
        assert_eq!(
            rendered,
            Rendered {
                short_message: "hi".to_owned(),
                full_message: "hi".to_owned()
            }
        );
        assert_eq!(sink.count(), 0);
    }
}
