use crate::PreviewError;
use url::{ParseError, Url};

/// Outcome of checking a target URL against the calling page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Servable(Url),
    UnsupportedProtocol,
    SameOrigin,
    Unparseable(ParseError),
}

impl Verdict {
    pub fn into_result(self) -> Result<Url, PreviewError> {
        match self {
            Verdict::Servable(url) => Ok(url),
            Verdict::UnsupportedProtocol => Err(PreviewError::UnsupportedProtocol),
            Verdict::SameOrigin => Err(PreviewError::SameOrigin),
            Verdict::Unparseable(e) => Err(PreviewError::OriginParse(e)),
        }
    }
}

/// Rejects non-HTTPS targets and links that point back at the caller's own
/// origin. The caller already has metadata for its own pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct OriginGuard;

impl OriginGuard {
    pub fn evaluate(target: &str, caller: Option<&str>) -> Verdict {
        if !has_https_scheme(target) {
            return Verdict::UnsupportedProtocol;
        }

        let target = match Url::parse(target) {
            Ok(url) => url,
            Err(e) => return Verdict::Unparseable(e),
        };

        // No origin header means an external caller
        let Some(caller) = caller else {
            return Verdict::Servable(target);
        };

        match Url::parse(caller) {
            Ok(caller) if same_origin(&caller, &target) => Verdict::SameOrigin,
            Ok(_) => Verdict::Servable(target),
            Err(e) => Verdict::Unparseable(e),
        }
    }
}

/// Scheme, host and port equality, with default ports normalized.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    let origin = a.origin();
    origin.is_tuple() && origin == b.origin()
}

/// The caller's origin: the `Origin` header, else the `Referer` header.
pub fn caller_origin<'a>(origin: Option<&'a str>, referer: Option<&'a str>) -> Option<&'a str> {
    origin
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .or_else(|| referer.map(str::trim).filter(|r| !r.is_empty()))
}

fn has_https_scheme(target: &str) -> bool {
    let prefixed = target
        .trim_start()
        .get(..8)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("https://"));
    // `https:host` without slashes still parses as an https URL
    prefixed || Url::parse(target).is_ok_and(|url| url.scheme() == "https")
}
