//! Write routing table.
//!
//! A write is classified by matching the path's components against an
//! ordered list of patterns; the first match wins and anything unmatched is a
//! plain data write.

use nvimfs_core::SessionId;
use nvimfs_vfs::VfsPath;

/// What a write to a path means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `/clients/new`: register a session
    NewSession,
    /// `/clients/<id>/cmd`: execute commands
    Command(SessionId),
    /// `/clients/<id>/eval`: evaluate expressions
    Eval(SessionId),
    /// `/clients/<id>/buffers/new`: open files
    NewBuffer(SessionId),
    /// `/clients/<id>/windows/new`: split windows
    NewWindow(SessionId),
    /// Any other file below a session directory
    SessionFile(SessionId),
    /// Outside every session
    Plain,
}

impl Route {
    /// Returns the session a route belongs to, if any.
    #[must_use]
    pub const fn session(self) -> Option<SessionId> {
        match self {
            Self::Command(id)
            | Self::Eval(id)
            | Self::NewBuffer(id)
            | Self::NewWindow(id)
            | Self::SessionFile(id) => Some(id),
            Self::NewSession | Self::Plain => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Segment {
    Lit(&'static str),
    Id,
    Rest,
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    NewSession,
    Command,
    Eval,
    NewBuffer,
    NewWindow,
    SessionFile,
}

use Segment::{Id, Lit, Rest};

const ROUTES: &[(&[Segment], Kind)] = &[
    (&[Lit("clients"), Lit("new")], Kind::NewSession),
    (&[Lit("clients"), Id, Lit("cmd")], Kind::Command),
    (&[Lit("clients"), Id, Lit("eval")], Kind::Eval),
    (&[Lit("clients"), Id, Lit("buffers"), Lit("new")], Kind::NewBuffer),
    (&[Lit("clients"), Id, Lit("windows"), Lit("new")], Kind::NewWindow),
    (&[Lit("clients"), Id, Rest], Kind::SessionFile),
];

/// Classifies a write target.
///
/// # Examples
///
/// ```
/// use nvimfs_core::SessionId;
/// use nvimfs_server::route::{Route, classify};
/// use nvimfs_vfs::VfsPath;
///
/// let path = VfsPath::new("/clients/3/eval")?;
/// assert_eq!(classify(&path), Route::Eval(SessionId::new(3)));
///
/// let path = VfsPath::new("/clients/3/evaluate")?;
/// assert_eq!(classify(&path), Route::SessionFile(SessionId::new(3)));
///
/// let path = VfsPath::new("/notes")?;
/// assert_eq!(classify(&path), Route::Plain);
/// # Ok::<(), nvimfs_vfs::VfsError>(())
/// ```
#[must_use]
pub fn classify(path: &VfsPath) -> Route {
    let segments: Vec<&str> = path.segments().collect();
    ROUTES
        .iter()
        .find_map(|(pattern, kind)| {
            matches(pattern, &segments).map(|session| build(*kind, session))
        })
        .unwrap_or(Route::Plain)
}

/// Extracts the session id of any path strictly below `/clients/<id>/`.
#[must_use]
pub fn session_of(path: &VfsPath) -> Option<SessionId> {
    let segments: Vec<&str> = path.segments().collect();
    matches(&[Lit("clients"), Id, Rest], &segments).flatten()
}

/// Parses a canonical session id component (`"7"`, not `"07"` or `"+7"`).
#[must_use]
pub fn parse_session_id(segment: &str) -> Option<SessionId> {
    segment
        .parse::<SessionId>()
        .ok()
        .filter(|id| id.to_string() == segment)
}

// `Some(session)` on a match; the inner option is the captured id.
fn matches(pattern: &[Segment], segments: &[&str]) -> Option<Option<SessionId>> {
    let mut session = None;
    for (i, part) in pattern.iter().enumerate() {
        match part {
            Lit(expected) => {
                if segments.get(i) != Some(expected) {
                    return None;
                }
            }
            Id => session = Some(parse_session_id(segments.get(i)?)?),
            Rest => return (segments.len() > i).then_some(session),
        }
    }
    (segments.len() == pattern.len()).then_some(session)
}

fn build(kind: Kind, session: Option<SessionId>) -> Route {
    match (kind, session) {
        (Kind::NewSession, _) => Route::NewSession,
        (Kind::Command, Some(id)) => Route::Command(id),
        (Kind::Eval, Some(id)) => Route::Eval(id),
        (Kind::NewBuffer, Some(id)) => Route::NewBuffer(id),
        (Kind::NewWindow, Some(id)) => Route::NewWindow(id),
        (Kind::SessionFile, Some(id)) => Route::SessionFile(id),
        _ => Route::Plain,
    }
}
