//! Page selection
//!
//! Resolves user-supplied page directives (checkbox-style "all"/"none"/"first N",
//! explicit page numbers and typed ranges such as `1-3,6,9-10`) against the
//! page count of a document.
//!
//! Parsing is best effort: a token that is neither an integer nor an `a-b`
//! range is skipped, and page numbers outside `[1, page_count]` are dropped.
//! Neither case is an error.

use std::collections::BTreeSet;

/// A single selection directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Every page of the document
    All,
    /// No pages
    None,
    /// The first `n` pages (fewer if the document is shorter)
    FirstN(u32),
    /// Individual 1-based page numbers
    Explicit(Vec<i64>),
    /// Inclusive span between two bounds, in either order
    Range(i64, i64),
}

impl Directive {
    /// Expand the directive into valid page numbers for a document
    fn pages(&self, page_count: u32) -> Vec<u32> {
        match self {
            Directive::All => (1..=page_count).collect(),
            Directive::None => Vec::new(),
            Directive::FirstN(n) => (1..=(*n).min(page_count)).collect(),
            Directive::Explicit(list) => list
                .iter()
                .filter_map(|&p| clamp_page(p, page_count))
                .collect(),
            Directive::Range(a, b) => {
                let lo = (*a).min(*b).max(1);
                let hi = (*a).max(*b).min(i64::from(page_count));
                if lo > hi {
                    return Vec::new();
                }
                (lo..=hi).map(|p| p as u32).collect()
            }
        }
    }
}

fn clamp_page(page: i64, page_count: u32) -> Option<u32> {
    if page >= 1 && page <= i64::from(page_count) {
        Some(page as u32)
    } else {
        None
    }
}

/// Parse a typed selection such as `"1-3, 6, 9-10"` into directives
///
/// Tokens are separated by commas and trimmed. A token containing a dash is read
/// as a range, anything else as a single page number. Tokens that fail to parse
/// are skipped.
pub fn parse_directives(text: &str) -> Vec<Directive> {
    text.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(parse_token)
        .collect()
}

fn parse_token(token: &str) -> Option<Directive> {
    if let Some((a, b)) = token.split_once('-') {
        let a = a.trim().parse::<i64>().ok()?;
        let b = b.trim().parse::<i64>().ok()?;
        Some(Directive::Range(a, b))
    } else {
        token.parse::<i64>().ok().map(|p| Directive::Explicit(vec![p]))
    }
}

/// A validated set of selected pages for one document
///
/// Pages are unique, 1-based, within `[1, page_count]` and always iterate in
/// ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    page_count: u32,
    pages: BTreeSet<u32>,
}

impl PageSelection {
    /// An empty selection for a document with `page_count` pages
    pub fn new(page_count: u32) -> Self {
        Self {
            page_count,
            pages: BTreeSet::new(),
        }
    }

    /// Resolve a set of directives into a selection (union of all directives)
    pub fn resolve(page_count: u32, directives: &[Directive]) -> Self {
        let mut selection = Self::new(page_count);
        for directive in directives {
            selection.apply(directive);
        }
        selection
    }

    /// Parse a typed range string and resolve it
    pub fn from_text(page_count: u32, text: &str) -> Self {
        Self::resolve(page_count, &parse_directives(text))
    }

    /// Union the pages of a directive into the selection
    pub fn apply(&mut self, directive: &Directive) {
        self.pages.extend(directive.pages(self.page_count));
    }

    /// Parse a typed range string and union it into the selection
    pub fn apply_text(&mut self, text: &str) {
        for directive in parse_directives(text) {
            self.apply(&directive);
        }
    }

    /// Replace the selection with the pages of a directive
    pub fn replace(&mut self, directive: &Directive) {
        self.pages.clear();
        self.apply(directive);
    }

    /// Select or deselect a single page; out-of-range pages are ignored
    pub fn toggle(&mut self, page: u32, selected: bool) {
        if page == 0 || page > self.page_count {
            return;
        }
        if selected {
            self.pages.insert(page);
        } else {
            self.pages.remove(&page);
        }
    }

    /// Whether a page is selected
    pub fn contains(&self, page: u32) -> bool {
        self.pages.contains(&page)
    }

    /// Selected pages in ascending order
    pub fn pages(&self) -> Vec<u32> {
        self.pages.iter().copied().collect()
    }

    /// Iterate selected pages in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }
}
