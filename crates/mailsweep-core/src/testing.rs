//! In-memory mailbox for engine tests.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::io;

use mailsweep_imap::{Error, Result, SearchCriteria, Uid};

use crate::store::MailStore;

pub fn uid(n: u32) -> Uid {
    Uid::new(n).unwrap()
}

fn dropped() -> Error {
    Error::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
}

/// Mailbox double that logs every call and fails on demand.
///
/// A transport failure marks the fake as disconnected until `reconnect`.
#[derive(Debug)]
pub struct FakeStore {
    /// FROM term (lower-cased) to the UIDs a server search returns.
    pub senders: HashMap<String, Vec<Uid>>,
    /// UID to raw `From`/`Subject` header lines.
    pub messages: BTreeMap<Uid, (String, String)>,
    /// Scripted probe answers; empty means "connected?".
    pub probes: VecDeque<bool>,
    pub connected: bool,
    pub reject_charset: bool,
    pub reject_search: bool,
    /// UIDs whose next fetch fails; `true` means a transport failure.
    pub fetch_failures: HashMap<Uid, bool>,
    /// UIDs to remaining STORE failures.
    pub store_failures: HashMap<Uid, usize>,
    pub expunge_failures: usize,
    pub reconnect_failures: usize,
    pub calls: Vec<String>,
    pub flagged: Vec<Uid>,
    pub expunged: HashSet<Uid>,
}

impl Default for FakeStore {
    fn default() -> Self {
        Self {
            senders: HashMap::new(),
            messages: BTreeMap::new(),
            probes: VecDeque::new(),
            connected: true,
            reject_charset: false,
            reject_search: false,
            fetch_failures: HashMap::new(),
            store_failures: HashMap::new(),
            expunge_failures: 0,
            reconnect_failures: 0,
            calls: Vec::new(),
            flagged: Vec::new(),
            expunged: HashSet::new(),
        }
    }
}

impl FakeStore {
    pub fn with_sender(mut self, name: &str, uids: &[u32]) -> Self {
        self.senders
            .insert(name.to_lowercase(), uids.iter().copied().map(uid).collect());
        self
    }

    pub fn with_message(mut self, n: u32, from: &str, subject: &str) -> Self {
        self.messages
            .insert(uid(n), (from.to_string(), subject.to_string()));
        self
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn require_connection(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(Error::ConnectionLost("not connected".into()))
        }
    }

    fn header_block(&self, uid: Uid, fields: &[&str]) -> Option<Vec<u8>> {
        let (from, subject) = self.messages.get(&uid)?;
        let mut block = String::new();
        for field in fields {
            if field.eq_ignore_ascii_case("FROM") {
                block.push_str(&format!("From: {from}\r\n"));
            } else if field.eq_ignore_ascii_case("SUBJECT") {
                block.push_str(&format!("Subject: {subject}\r\n"));
            }
        }
        block.push_str("\r\n");
        Some(block.into_bytes())
    }
}

impl MailStore for FakeStore {
    async fn is_alive(&mut self) -> bool {
        self.calls.push("NOOP".into());
        let alive = self.probes.pop_front().unwrap_or(self.connected);
        if !alive {
            self.connected = false;
        }
        alive
    }

    async fn reconnect(&mut self) -> Result<()> {
        self.calls.push("RECONNECT".into());
        if self.reconnect_failures > 0 {
            self.reconnect_failures -= 1;
            self.connected = false;
            return Err(dropped());
        }
        self.connected = true;
        Ok(())
    }

    async fn uid_search(
        &mut self,
        criteria: &SearchCriteria,
        charset: Option<&str>,
    ) -> Result<Vec<Uid>> {
        self.calls.push(format!("SEARCH {charset:?}"));
        self.require_connection()?;
        if self.reject_search || (charset.is_some() && self.reject_charset) {
            return Err(Error::Bad("unsupported".into()));
        }
        match criteria {
            SearchCriteria::From(term) => Ok(self
                .senders
                .get(&term.to_lowercase())
                .cloned()
                .unwrap_or_default()),
            SearchCriteria::All => Ok(self
                .messages
                .keys()
                .filter(|u| !self.expunged.contains(u))
                .copied()
                .collect()),
        }
    }

    async fn fetch_header_fields(&mut self, uid: Uid, fields: &[&str]) -> Result<Option<Vec<u8>>> {
        self.calls.push(format!("FETCH {uid}"));
        self.require_connection()?;
        if let Some(transport) = self.fetch_failures.remove(&uid) {
            if transport {
                self.connected = false;
                return Err(dropped());
            }
            return Err(Error::No("fetch refused".into()));
        }
        Ok(self.header_block(uid, fields))
    }

    async fn store_deleted(&mut self, uid: Uid) -> Result<()> {
        self.calls.push(format!("STORE {uid}"));
        self.require_connection()?;
        if let Some(remaining) = self.store_failures.get_mut(&uid)
            && *remaining > 0
        {
            *remaining -= 1;
            self.connected = false;
            return Err(dropped());
        }
        self.flagged.push(uid);
        Ok(())
    }

    async fn expunge(&mut self) -> Result<()> {
        self.calls.push("EXPUNGE".into());
        self.require_connection()?;
        if self.expunge_failures > 0 {
            self.expunge_failures -= 1;
            return Err(Error::No("expunge failed".into()));
        }
        self.expunged.extend(self.flagged.iter().copied());
        Ok(())
    }
}
