//! Session-expiry collaborator.
//!
//! The client never navigates on its own. When a session cannot be renewed it
//! returns a terminal 401 and tells the registered `SessionListener`; what to
//! do about it is up to the UI layer. `LoginRedirect` is the stock listener
//! that sends the user to the login page.

/// Path of the login entry point.
pub const LOGIN_PATH: &str = "/login";

/// Notified when a request fails because the session could not be renewed.
pub trait SessionListener: Send + Sync {
    fn session_expired(&self);
}

/// Access to the embedding environment's current location.
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;
    fn navigate(&self, path: &str);
}

/// Redirects to the login page unless the user is already on it.
#[derive(Debug, Clone)]
pub struct LoginRedirect<N> {
    navigator: N,
}

impl<N: Navigator> LoginRedirect<N> {
    pub fn new(navigator: N) -> Self {
        Self { navigator }
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }
}

impl<N: Navigator> SessionListener for LoginRedirect<N> {
    fn session_expired(&self) {
        if self.navigator.current_path() != LOGIN_PATH {
            tracing::debug!("redirecting to login after session expiry");
            self.navigator.navigate(LOGIN_PATH);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeLocation {
        path: Mutex<String>,
        visits: Mutex<Vec<String>>,
    }

    impl FakeLocation {
        fn at(path: &str) -> Self {
            Self {
                path: Mutex::new(path.to_string()),
                visits: Mutex::new(Vec::new()),
            }
        }
    }

    impl Navigator for FakeLocation {
        fn current_path(&self) -> String {
            self.path.lock().unwrap().clone()
        }

        fn navigate(&self, path: &str) {
            *self.path.lock().unwrap() = path.to_string();
            self.visits.lock().unwrap().push(path.to_string());
        }
    }

    #[test]
    fn redirects_from_protected_page() {
        let redirect = LoginRedirect::new(FakeLocation::at("/dashboard"));
        redirect.session_expired();
        assert_eq!(redirect.navigator().current_path(), "/login");
        assert_eq!(*redirect.navigator().visits.lock().unwrap(), ["/login"]);
    }

    #[test]
    fn stays_put_on_login_page() {
        let redirect = LoginRedirect::new(FakeLocation::at("/login"));
        redirect.session_expired();
        redirect.session_expired();
        assert!(redirect.navigator().visits.lock().unwrap().is_empty());
    }

    #[test]
    fn repeated_expiry_redirects_once() {
        let redirect = LoginRedirect::new(FakeLocation::at("/tasks/t1/edit"));
        redirect.session_expired();
        redirect.session_expired();
        assert_eq!(redirect.navigator().visits.lock().unwrap().len(), 1);
    }
}
