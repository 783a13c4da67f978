use derive_more::{Display, Error};

/// Fatal startup misconfiguration.
///
/// Raised by [`SecurityHandlerBuilder::build`](crate::http::security::handler::SecurityHandlerBuilder::build);
/// a handler with one of these problems refuses to activate rather than
/// failing requests later.
#[derive(Debug, Display, Error)]
pub enum ConfigError {
    /// The configured login service is already bound to a different identity
    /// service than the one resolved for this handler.
    #[display("LoginService has a different IdentityService than the security handler")]
    MismatchedIdentityService,

    /// A realm name was configured but no authenticator could be produced.
    /// A stated realm without an authenticator able to use it cannot be
    /// recovered from at request time.
    #[display("no authenticator for realm {realm:?}")]
    NoAuthenticator {
        #[error(not(source))]
        realm: String,
    },

    /// An authenticator scheme needs a login service and none was resolved.
    #[display("{method} authenticator requires a login service")]
    MissingLoginService {
        #[error(not(source))]
        method: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ConfigError::NoAuthenticator {
            realm: "Test Realm".into(),
        };
        assert!(err.to_string().contains("Test Realm"));

        let err = ConfigError::MissingLoginService {
            method: "BASIC".into(),
        };
        assert_eq!(err.to_string(), "BASIC authenticator requires a login service");
    }
}
