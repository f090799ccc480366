use crate::constants::COLLABORATION_PATH;

/// Build the shareable URL for a token: `<origin>/collaborate/<token>`.
pub fn share_url(origin: &str, token: &str) -> String {
    format!(
        "{}/{}/{}",
        origin.trim_end_matches('/'),
        COLLABORATION_PATH,
        token
    )
}

/// Extract the token from a shareable URL or a bare path.
///
/// Returns the segment directly following the collaboration path, without
/// query string or fragment.
pub fn token_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let mut segments = path.split('/').skip_while(|s| *s != COLLABORATION_PATH);
    segments.next()?;
    segments.next().filter(|s| !s.is_empty())
}
