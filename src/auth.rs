use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};

pub const SESSION_COOKIE: &str = "admin_authenticated";
const SESSION_MARKER: &str = "true";
pub const SESSION_MAX_AGE_SECS: i64 = 60 * 60 * 24; // 24 hours

/// Shared-secret check and session cookie handling for the admin panel.
///
/// There is no user identity: a session is a signed boolean flag.
#[derive(Clone)]
pub struct SessionGuard {
    admin_password: String,
    secure_cookies: bool,
}

impl SessionGuard {
    pub fn new(admin_password: impl Into<String>, secure_cookies: bool) -> Self {
        Self {
            admin_password: admin_password.into(),
            secure_cookies,
        }
    }

    /// Exact comparison against the configured secret.
    pub fn validate_password(&self, candidate: &str) -> bool {
        candidate == self.admin_password
    }

    pub fn establish_session(&self, jar: SignedCookieJar) -> SignedCookieJar {
        let cookie = Cookie::build((SESSION_COOKIE, SESSION_MARKER))
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Strict)
            .max_age(time::Duration::seconds(SESSION_MAX_AGE_SECS))
            .path("/")
            .build();
        jar.add(cookie)
    }

    pub fn end_session(&self, jar: SignedCookieJar) -> SignedCookieJar {
        jar.remove(Cookie::build(SESSION_COOKIE).path("/").build())
    }
}

/// True only for a cookie that verifies against the key and carries the marker.
pub fn is_session_active(jar: &SignedCookieJar) -> bool {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value() == SESSION_MARKER)
        .unwrap_or(false)
}

/// Signing key from `SESSION_SECRET`, or a random one per process.
pub fn signing_key(secret: Option<&[u8]>) -> anyhow::Result<Key> {
    match secret {
        Some(bytes) => Key::try_from(bytes)
            .map_err(|err| anyhow::anyhow!("invalid SESSION_SECRET: {err:?}")),
        None => {
            tracing::warn!("SESSION_SECRET not set; sessions will not survive a restart");
            Ok(Key::generate())
        }
    }
}
