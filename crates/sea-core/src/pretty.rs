//! Indentation-aware writer behind the textual module listing.

use std::fmt::{self, Formatter, Write as _};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingOptions {
    /// Spaces per nesting level.
    pub indent: usize,
    /// Append `; <type>` to value-producing instructions.
    pub annotate_types: bool,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            annotate_types: true,
        }
    }
}

pub struct Listing {
    pub options: ListingOptions,
    depth: usize,
}

impl Listing {
    pub fn new(options: ListingOptions) -> Self {
        Self { options, depth: 0 }
    }

    pub fn line(&self, f: &mut Formatter<'_>, text: impl AsRef<str>) -> fmt::Result {
        writeln!(f, "{:width$}{}", "", text.as_ref(), width = self.depth)
    }

    /// Runs `body` one level deeper.
    pub fn nested(&mut self, body: impl FnOnce(&mut Self) -> fmt::Result) -> fmt::Result {
        self.depth += self.options.indent;
        let result = body(self);
        self.depth -= self.options.indent;
        result
    }
}

pub trait WriteListing {
    fn write_listing(&self, f: &mut Formatter<'_>, listing: &mut Listing) -> fmt::Result;
}

pub struct ListingDisplay<'a, T> {
    value: &'a T,
    options: ListingOptions,
}

impl<T: WriteListing> fmt::Display for ListingDisplay<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.value.write_listing(f, &mut Listing::new(self.options))
    }
}

pub fn listing<T: WriteListing>(value: &T, options: ListingOptions) -> ListingDisplay<'_, T> {
    ListingDisplay { value, options }
}

/// Escapes a string for a quoted listing field: `"`, `\` and control
/// characters become `\XX` hex escapes.
pub fn quote(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 2);
    out.push('"');
    for ch in input.chars() {
        if ch == '"' || ch == '\\' || ch.is_control() {
            let _ = write!(out, "\\{:02X}", ch as u32);
        } else {
            out.push(ch);
        }
    }
    out.push('"');
    out
}
