// src/printer/formatter.rs

//! Implements the message formatters: [`ConditionalFormatter`],
//! [`FlatFormatter`], and [`FallbackFormatter`], behind the
//! [`EventFormatter`] trait.
//!
//! A formatter turns one event's attribute values into a long and a
//! short single-line display string. Templates are analyzed once at
//! construction; placeholder-to-attribute-name extraction never
//! happens per render.
//!
//! Conditional and flat templates have different absence semantics, and
//! the difference matters: a conditional piece whose attribute is
//! absent or not meaningful is silently dropped, while a flat template
//! referencing an absent attribute fails the render with
//! [`FormatterError::MissingAttribute`].
//!
//! [`FormatterError::MissingAttribute`]: crate::common::FormatterError

use std::fmt;

use ::lazy_static::lazy_static;
use ::regex::Regex;
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

use crate::common::FormatterError;
use crate::data::event::{AttrValue, Event, EventValues};

/// Longest short message; anything longer is truncated to
/// [`MESSAGE_SHORT_TRUNCATE`] characters plus [`ELLIPSIS`].
pub const MESSAGE_SHORT_MAX: usize = 80;
pub const MESSAGE_SHORT_TRUNCATE: usize = 77;
pub const ELLIPSIS: &str = "...";

/// Attribute names the fallback formatter never renders.
pub const RESERVED_ATTRS: [&str; 7] = [
    "data_type",
    "offset",
    "query",
    "source_long",
    "source_short",
    "timestamp",
    "timestamp_desc",
];

lazy_static! {
    /// A `{placeholder}` naming one attribute.
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"\{([A-Za-z0-9_]+)\}").unwrap();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FormatterSpec
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Declarative mapping of one `data_type` to rendering rules. Compiled
/// into an [`EventFormatter`] at registry-build time.
#[derive(Clone, Debug)]
pub enum FormatterSpec {
    /// An ordered list of independent pieces, each with at most one
    /// placeholder, assembled conditionally at render time.
    Conditional {
        data_type: String,
        long: Vec<String>,
        short: Vec<String>,
        separator: String,
    },
    /// A single template string substituted directly; every referenced
    /// attribute must be present.
    Flat {
        data_type: String,
        long: String,
        short: String,
    },
}

impl FormatterSpec {
    pub fn conditional(
        data_type: &str,
        long: &[&str],
        short: &[&str],
    ) -> FormatterSpec {
        FormatterSpec::Conditional {
            data_type: data_type.to_string(),
            long: long.iter().map(|s| s.to_string()).collect(),
            short: short.iter().map(|s| s.to_string()).collect(),
            separator: String::from(" "),
        }
    }

    pub fn flat(
        data_type: &str,
        long: &str,
        short: &str,
    ) -> FormatterSpec {
        FormatterSpec::Flat {
            data_type: data_type.to_string(),
            long: long.to_string(),
            short: short.to_string(),
        }
    }

    pub fn data_type(&self) -> &str {
        match self {
            FormatterSpec::Conditional { data_type, .. } => data_type.as_str(),
            FormatterSpec::Flat { data_type, .. } => data_type.as_str(),
        }
    }

    /// Pre-analyze the templates. A conditional piece with more than
    /// one placeholder is a configuration error.
    pub(crate) fn compile(
        &self
    ) -> std::result::Result<Box<dyn EventFormatter>, FormatterError> {
        match self {
            FormatterSpec::Conditional {
                data_type,
                long,
                short,
                separator,
            } => Ok(Box::new(ConditionalFormatter::new(
                data_type, long, short, separator,
            )?)),
            FormatterSpec::Flat {
                data_type,
                long,
                short,
            } => Ok(Box::new(FlatFormatter::new(data_type, long, short))),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// rendering helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Formatting is always single-line.
fn strip_crlf(message: String) -> String {
    if !message.contains(['\r', '\n']) {
        return message;
    }

    message.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

/// Truncate an over-long short message to
/// [`MESSAGE_SHORT_TRUNCATE`] characters plus [`ELLIPSIS`].
fn truncate_short(message: String) -> String {
    if message.chars().count() <= MESSAGE_SHORT_MAX {
        return message;
    }
    let mut truncated: String = message.chars().take(MESSAGE_SHORT_TRUNCATE).collect();
    truncated.push_str(ELLIPSIS);

    truncated
}

/// Final single-line cleanup for a rendered `(long, short)` pair.
/// `short` falls back to the long message when no short template was
/// specified.
fn finalize(
    long: String,
    short: Option<String>,
) -> (String, String) {
    let long: String = strip_crlf(long);
    let short: String = truncate_short(strip_crlf(short.unwrap_or_else(|| long.clone())));

    (long, short)
}

fn check_data_type(
    formatter_data_type: &str,
    event: &Event,
) -> std::result::Result<(), FormatterError> {
    if formatter_data_type != event.data_type() {
        return Err(FormatterError::DataTypeMismatch {
            expected: formatter_data_type.to_string(),
            got: event.data_type().to_string(),
        });
    }

    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EventFormatter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Renders events of one `data_type` into `(long, short)` single-line
/// messages.
pub trait EventFormatter: fmt::Debug + Send + Sync {
    /// The `data_type` this formatter renders; `""` for the fallback,
    /// which accepts any event.
    fn data_type(&self) -> &str;

    fn get_messages(
        &self,
        event: &Event,
    ) -> std::result::Result<(String, String), FormatterError>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ConditionalFormatter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One pre-analyzed piece of a conditional template: the piece text and
/// the attribute its single placeholder names, if any.
#[derive(Clone, Debug)]
struct MessagePiece {
    text: String,
    attr: Option<String>,
}

impl MessagePiece {
    fn analyze(text: &str) -> std::result::Result<MessagePiece, FormatterError> {
        let mut placeholders = PLACEHOLDER_RE.captures_iter(text);
        let attr: Option<String> = placeholders.next().map(|caps| caps[1].to_string());
        if placeholders.next().is_some() {
            return Err(FormatterError::BadPiece {
                piece: text.to_string(),
            });
        }

        Ok(MessagePiece {
            text: text.to_string(),
            attr,
        })
    }

    fn analyze_all(
        texts: &[String]
    ) -> std::result::Result<Vec<MessagePiece>, FormatterError> {
        texts.iter().map(|text| MessagePiece::analyze(text)).collect()
    }

    /// The substituted piece, or `None` when its attribute is absent or
    /// not meaningful (an empty string or sequence; zero and `false`
    /// are meaningful).
    fn render(
        &self,
        values: &dyn EventValues,
    ) -> Option<String> {
        let attr: &str = match self.attr.as_deref() {
            Some(attr) => attr,
            None => return Some(self.text.clone()),
        };
        let value: AttrValue = values.value(attr)?;
        if !value.is_meaningful() {
            return None;
        }

        Some(
            self.text
                .replacen(format!("{{{}}}", attr).as_str(), value.to_string().as_str(), 1),
        )
    }
}

/// Assembles messages from independent conditional pieces joined by a
/// separator.
#[derive(Clone, Debug)]
pub struct ConditionalFormatter {
    data_type: String,
    long: Vec<MessagePiece>,
    short: Vec<MessagePiece>,
    separator: String,
}

impl ConditionalFormatter {
    pub fn new(
        data_type: &str,
        long: &[String],
        short: &[String],
        separator: &str,
    ) -> std::result::Result<ConditionalFormatter, FormatterError> {
        Ok(ConditionalFormatter {
            data_type: data_type.to_string(),
            long: MessagePiece::analyze_all(long)?,
            short: MessagePiece::analyze_all(short)?,
            separator: separator.to_string(),
        })
    }

    fn render_pieces(
        pieces: &[MessagePiece],
        values: &dyn EventValues,
        separator: &str,
    ) -> String {
        pieces
            .iter()
            .filter_map(|piece| piece.render(values))
            .collect::<Vec<String>>()
            .join(separator)
    }
}

impl EventFormatter for ConditionalFormatter {
    fn data_type(&self) -> &str {
        self.data_type.as_str()
    }

    fn get_messages(
        &self,
        event: &Event,
    ) -> std::result::Result<(String, String), FormatterError> {
        check_data_type(self.data_type.as_str(), event)?;
        let values: &dyn EventValues = event.values().as_ref();
        let long: String =
            ConditionalFormatter::render_pieces(self.long.as_slice(), values, self.separator.as_str());
        let short: Option<String> = if self.short.is_empty() {
            None
        } else {
            Some(ConditionalFormatter::render_pieces(
                self.short.as_slice(),
                values,
                self.separator.as_str(),
            ))
        };

        Ok(finalize(long, short))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FlatFormatter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Direct placeholder substitution over an entire template string.
/// Every referenced attribute must be present on the event.
#[derive(Clone, Debug)]
pub struct FlatFormatter {
    data_type: String,
    long: String,
    short: String,
    /// Attribute names referenced by `long`, extracted at construction.
    long_attrs: Vec<String>,
    short_attrs: Vec<String>,
}

fn template_attrs(template: &str) -> Vec<String> {
    PLACEHOLDER_RE
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}

impl FlatFormatter {
    pub fn new(
        data_type: &str,
        long: &str,
        short: &str,
    ) -> FlatFormatter {
        FlatFormatter {
            data_type: data_type.to_string(),
            long: long.to_string(),
            short: short.to_string(),
            long_attrs: template_attrs(long),
            short_attrs: template_attrs(short),
        }
    }

    fn render(
        &self,
        template: &str,
        attrs: &[String],
        values: &dyn EventValues,
    ) -> std::result::Result<String, FormatterError> {
        let mut message: String = template.to_string();
        for attr in attrs.iter() {
            let value: AttrValue = match values.value(attr.as_str()) {
                Some(value) => value,
                None => {
                    return Err(FormatterError::MissingAttribute {
                        attribute: attr.clone(),
                        data_type: self.data_type.clone(),
                    })
                }
            };
            message = message.replace(
                format!("{{{}}}", attr).as_str(),
                value.to_string().as_str(),
            );
        }

        Ok(message)
    }
}

impl EventFormatter for FlatFormatter {
    fn data_type(&self) -> &str {
        self.data_type.as_str()
    }

    fn get_messages(
        &self,
        event: &Event,
    ) -> std::result::Result<(String, String), FormatterError> {
        check_data_type(self.data_type.as_str(), event)?;
        let values: &dyn EventValues = event.values().as_ref();
        let long: String = self.render(self.long.as_str(), self.long_attrs.as_slice(), values)?;
        let short: Option<String> = if self.short.is_empty() {
            None
        } else {
            Some(self.render(self.short.as_str(), self.short_attrs.as_slice(), values)?)
        };

        Ok(finalize(long, short))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FallbackFormatter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The default formatter for unmapped `data_type`s: renders every
/// non-reserved attribute as `name: value` pairs. The only formatter
/// that does not require an exact `data_type` match.
#[derive(Clone, Debug, Default)]
pub struct FallbackFormatter;

impl EventFormatter for FallbackFormatter {
    fn data_type(&self) -> &str {
        ""
    }

    fn get_messages(
        &self,
        event: &Event,
    ) -> std::result::Result<(String, String), FormatterError> {
        let values: &dyn EventValues = event.values().as_ref();
        let long: String = values
            .names()
            .into_iter()
            .filter(|name| !RESERVED_ATTRS.contains(name))
            .filter_map(|name| {
                values
                    .value(name)
                    .map(|value| format!("{}: {}", name, value))
            })
            .collect::<Vec<String>>()
            .join(" ");

        Ok(finalize(long, None))
    }
}
