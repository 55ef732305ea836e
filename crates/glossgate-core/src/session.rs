use crate::model::SessionId;

/// Picks the session a request is evaluated under.
///
/// Desktop deployments multiplex many logical sessions behind one transport
/// identity, so the session carried in the desktop cookie replaces the raw
/// one. A missing or malformed cookie leaves the request anonymous.
pub fn resolve_effective_session(
    raw: Option<SessionId>,
    desktop_mode: bool,
    desktop_cookie: Option<&str>,
) -> Option<SessionId> {
    if !desktop_mode {
        return raw;
    }

    let cookie = desktop_cookie?;
    match cookie.trim().parse::<i64>() {
        Ok(id) => Some(SessionId::new(id)),
        Err(_) => {
            tracing::debug!(cookie, "ignoring malformed desktop session cookie");
            None
        }
    }
}
