//! Command argument types.

use crate::types::Flag;

/// SEARCH criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// All messages.
    All,
    /// FROM header contains text.
    From(String),
}

impl SearchCriteria {
    /// FROM criterion for a sender-name substring.
    #[must_use]
    pub fn from_sender(name: impl Into<String>) -> Self {
        Self::From(name.into())
    }
}

/// FETCH data item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// `BODY[HEADER.FIELDS (...)]`, optionally as `BODY.PEEK` so `\Seen`
    /// stays untouched.
    HeaderFields {
        /// Header names to return.
        fields: Vec<String>,
        /// Peek without setting `\Seen`.
        peek: bool,
    },
}

impl FetchAttribute {
    /// Peeked header fields, e.g. `BODY.PEEK[HEADER.FIELDS (SUBJECT)]`.
    #[must_use]
    pub fn peek_header_fields<I, T>(fields: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::HeaderFields {
            fields: fields.into_iter().map(Into::into).collect(),
            peek: true,
        }
    }
}

/// STORE action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// `+FLAGS`
    AddFlags(Vec<Flag>),
}
