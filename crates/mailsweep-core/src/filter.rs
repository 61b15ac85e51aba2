//! Match predicates.
//!
//! A predicate either hands its terms to the server (`UID SEARCH FROM`) or is
//! evaluated client-side over fetched headers.

use mailsweep_imap::Uid;

/// What a predicate sees of a message during a client-side scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Message UID.
    pub uid: Uid,
    /// Decoded sender display name.
    pub sender: String,
    /// Decoded subject.
    pub subject: String,
}

/// Decides which messages a sweep targets.
pub trait MatchPredicate {
    /// Returns the matching term, or `None` if the candidate is not targeted.
    fn matches(&self, candidate: &Candidate) -> Option<String>;

    /// One-line description for the run header.
    fn describe(&self) -> String;

    /// Terms that can be pushed to a server-side `FROM` search.
    fn server_terms(&self) -> Option<&[String]> {
        None
    }
}

/// Targets senders whose display name contains any of the names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderNameFilter {
    names: Vec<String>,
}

impl SenderNameFilter {
    /// Creates a filter; blank names are dropped.
    #[must_use]
    pub fn new<I, T>(names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            names: clean_terms(names),
        }
    }
}

impl MatchPredicate for SenderNameFilter {
    fn matches(&self, candidate: &Candidate) -> Option<String> {
        first_contained(&self.names, &candidate.sender)
    }

    fn describe(&self) -> String {
        format!("Senders containing: {}", self.names.join(", "))
    }

    fn server_terms(&self) -> Option<&[String]> {
        Some(&self.names)
    }
}

/// Targets subjects containing any of the keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectFilter {
    keywords: Vec<String>,
}

impl SubjectFilter {
    /// Creates a filter; blank keywords are dropped.
    #[must_use]
    pub fn new<I, T>(keywords: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            keywords: clean_terms(keywords),
        }
    }
}

impl MatchPredicate for SubjectFilter {
    fn matches(&self, candidate: &Candidate) -> Option<String> {
        first_contained(&self.keywords, &candidate.subject)
    }

    fn describe(&self) -> String {
        let upper: Vec<String> = self.keywords.iter().map(|k| k.to_uppercase()).collect();
        format!("Subjects containing: {}", upper.join(", "))
    }
}

fn clean_terms<I, T>(terms: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    terms
        .into_iter()
        .map(|t| t.into().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Case-insensitive containment; returns the first term found.
fn first_contained(terms: &[String], haystack: &str) -> Option<String> {
    let haystack = haystack.to_lowercase();
    terms
        .iter()
        .find(|term| haystack.contains(&term.to_lowercase()))
        .cloned()
}
