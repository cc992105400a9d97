//! Cookie store enforcing the origin-only acceptance policy.

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use reqwest::Url;

/// Cookie jar that only keeps cookies scoped to the host that set them.
///
/// A cookie is accepted when it carries no `Domain` attribute (host-only) or
/// when its `Domain` equals the responding host. Cookies widening their scope
/// to a parent domain are discarded.
#[derive(Debug, Default)]
pub(crate) struct OriginOnlyJar {
    jar: Jar,
}

impl CookieStore for OriginOnlyJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let host = url.host_str().unwrap_or_default();
        let mut accepted = cookie_headers.filter(|header| {
            let keep = is_origin_scoped(header, host);
            if !keep {
                log::debug!("Rejecting cookie not scoped to {host}");
            }
            keep
        });
        self.jar.set_cookies(&mut accepted, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.jar.cookies(url)
    }
}

fn is_origin_scoped(header: &HeaderValue, host: &str) -> bool {
    let Ok(text) = header.to_str() else {
        return false;
    };

    let domain = text.split(';').skip(1).find_map(|attribute| {
        let (name, value) = attribute.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("domain")
            .then(|| value.trim().trim_start_matches('.'))
    });

    match domain {
        None | Some("") => true,
        Some(domain) => domain.eq_ignore_ascii_case(host),
    }
}
