//! Origin allowlist and the admission decision.

use crate::telemetry::{Event, EventSink};

/// Outcome of [`decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Ordered, immutable set of origins allowed credentialed cross-origin access.
///
/// Membership is an exact byte-for-byte comparison. Entries are not
/// normalised: `https://app.example/` and `https://app.example` are distinct,
/// and the former can never match an `Origin` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allowlist {
    origins: Vec<String>,
}

impl Allowlist {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for origin in origins {
            let origin = origin.into();
            if !list.contains(&origin) {
                list.push(origin);
            }
        }
        Self { origins: list }
    }

    /// Parse a comma-separated list. Whitespace around entries and empty
    /// entries are dropped; nothing else about an entry is touched.
    pub fn parse(csv: &str) -> Self {
        Self::new(csv.split(',').map(str::trim).filter(|s| !s.is_empty()))
    }

    pub fn contains(&self, origin: &str) -> bool {
        self.origins.iter().any(|o| o == origin)
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.origins.iter().map(String::as_str)
    }

    /// Entries that carry a path (anything after the authority, including a
    /// lone trailing `/`). Browsers never send a path in `Origin`, so these
    /// entries can never match.
    pub fn unreachable_entries(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|entry| {
            let rest = entry.split_once("://").map_or(*entry, |(_, rest)| rest);
            rest.contains('/')
        })
    }

    /// Report every unreachable entry once. Called when the list is loaded.
    pub fn report_unreachable(&self, events: &dyn EventSink) {
        for entry in self.unreachable_entries() {
            events.emit(Event::AllowlistEntryUnreachable {
                entry: entry.to_owned(),
            });
        }
    }
}

/// Decide whether a request carrying `origin` may proceed.
///
/// - no origin (non-browser client): allow
/// - listed origin: allow
/// - unlisted origin in development: allow, and emit exactly one
///   [`Event::OriginBypassed`]
/// - unlisted origin otherwise: deny
pub fn decide(
    origin: Option<&str>,
    allowlist: &Allowlist,
    dev_mode: bool,
    events: &dyn EventSink,
) -> Decision {
    let Some(origin) = origin else {
        return Decision::Allow;
    };
    if allowlist.contains(origin) {
        return Decision::Allow;
    }
    if dev_mode {
        events.emit(Event::OriginBypassed {
            origin: origin.to_owned(),
        });
        return Decision::Allow;
    }
    Decision::Deny
}
