//! Startup validation of a fully-loaded configuration.

use url::Url;

use crate::{
    error::{Error, Result},
    schema::CourierConfig,
};

/// Check that the config can authenticate and that its intervals are usable.
///
/// All missing credentials are reported together.
pub fn validate(config: &CourierConfig) -> Result<()> {
    let missing = config.credentials.missing();
    if !missing.is_empty() {
        return Err(Error::MissingCredentials(missing));
    }

    let agent = &config.agent;
    for (path, value) in [
        ("agent.keepalive_interval_secs", agent.keepalive_interval_secs),
        ("agent.request_timeout_secs", agent.request_timeout_secs),
        ("agent.download_timeout_secs", agent.download_timeout_secs),
        ("reconnect.initial_delay_ms", config.reconnect.initial_delay_ms),
    ] {
        if value == 0 {
            return Err(Error::InvalidSetting {
                path,
                message: "must be greater than zero".into(),
            });
        }
    }

    if config.reconnect.max_delay_ms < config.reconnect.initial_delay_ms {
        return Err(Error::InvalidSetting {
            path: "reconnect.max_delay_ms",
            message: format!(
                "must be at least initial_delay_ms ({})",
                config.reconnect.initial_delay_ms
            ),
        });
    }

    check_http_url("agent.csds_url", &agent.csds_url)?;

    Ok(())
}

fn check_http_url(path: &'static str, raw: &str) -> Result<()> {
    let invalid = |message: String| Error::InvalidSetting { path, message };
    let url = Url::parse(raw).map_err(|e| invalid(format!("`{raw}` is not a valid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!(
            "`{raw}` uses unsupported scheme `{}`",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid(format!("`{raw}` has no host")));
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::schema::Credentials, secrecy::Secret};

    fn complete() -> CourierConfig {
        CourierConfig {
            credentials: Credentials {
                account_id: "12345678".into(),
                username: "bot".into(),
                app_key: Secret::new("k".into()),
                secret: Secret::new("s".into()),
                access_token: Secret::new("t".into()),
                access_token_secret: Secret::new("ts".into()),
            },
            ..Default::default()
        }
    }

    #[test]
    fn complete_config_is_valid() {
        validate(&complete()).unwrap();
    }

    #[test]
    fn reports_all_missing_credentials() {
        let err = validate(&CourierConfig::default()).unwrap_err();
        match err {
            Error::MissingCredentials(names) => assert_eq!(names.len(), 6),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_keepalive_is_rejected() {
        let mut cfg = complete();
        cfg.agent.keepalive_interval_secs = 0;
        assert!(matches!(
            validate(&cfg),
            Err(Error::InvalidSetting {
                path: "agent.keepalive_interval_secs",
                ..
            })
        ));
    }

    #[test]
    fn backoff_cap_below_initial_is_rejected() {
        let mut cfg = complete();
        cfg.reconnect.initial_delay_ms = 5_000;
        cfg.reconnect.max_delay_ms = 1_000;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn csds_url_must_be_http() {
        let mut cfg = complete();
        for bad in [
            "api.liveperson.net",
            "ftp://api.liveperson.net",
            "https://exa mple.com",
            "https://:8080",
            "http://?q=1",
            "https://[::1",
        ] {
            cfg.agent.csds_url = bad.into();
            assert!(
                matches!(
                    validate(&cfg),
                    Err(Error::InvalidSetting {
                        path: "agent.csds_url",
                        ..
                    })
                ),
                "{bad} should be rejected"
            );
        }

        for good in ["http://127.0.0.1:8080", "https://api.liveperson.net/"] {
            cfg.agent.csds_url = good.into();
            validate(&cfg).unwrap();
        }
    }
}
