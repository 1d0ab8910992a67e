//! Transport registration: plain http is always available, https only when a
//! TLS context could be set up.

use super::Collector;
use curl::easy::Easy2;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum TlsSetupError {
    #[error("libcurl was built without TLS support")]
    NoTlsBackend,
    #[error("CA bundle {} is not a readable file", .0.display())]
    MissingCaBundle(PathBuf),
    #[error("TLS options rejected: {0}")]
    Curl(#[from] curl::Error),
}

/// TLS options applied to every https transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    insecure: bool,
    ca_bundle: Option<PathBuf>,
}

impl TlsSettings {
    fn establish(insecure: bool, ca_bundle: Option<PathBuf>) -> Result<Self, TlsSetupError> {
        if !curl::Version::get().feature_ssl() {
            return Err(TlsSetupError::NoTlsBackend);
        }
        if let Some(path) = &ca_bundle {
            if !path.is_file() {
                return Err(TlsSetupError::MissingCaBundle(path.clone()));
            }
        }
        let settings = Self { insecure, ca_bundle };
        // Setting options performs no I/O, so a scratch handle catches
        // rejected values up front.
        let mut probe = Easy2::new(Collector::default());
        settings.apply(&mut probe)?;
        Ok(settings)
    }

    pub fn is_insecure(&self) -> bool {
        self.insecure
    }

    pub(crate) fn apply(&self, easy: &mut Easy2<Collector>) -> Result<(), curl::Error> {
        if let Some(path) = &self.ca_bundle {
            easy.cainfo(path)?;
        }
        if self.insecure {
            easy.ssl_verify_peer(false)?;
            easy.ssl_verify_host(false)?;
        }
        Ok(())
    }
}

/// Schemes the client will dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transports {
    https: Option<TlsSettings>,
}

impl Transports {
    /// Registers http, plus https when `include_https` is set and TLS setup
    /// succeeds. A TLS failure is logged and leaves https unregistered.
    pub fn register(include_https: bool, insecure: bool, ca_bundle: Option<PathBuf>) -> Self {
        if !include_https {
            return Self::http_only();
        }
        match TlsSettings::establish(insecure, ca_bundle) {
            Ok(tls) => {
                if tls.insecure {
                    warn!("TLS certificate and hostname verification are DISABLED (insecure_tls = true)");
                }
                Self { https: Some(tls) }
            }
            Err(err) => {
                warn!(error = %err, "https transport not registered; https pages will fail");
                Self::http_only()
            }
        }
    }

    pub fn http_only() -> Self {
        Self { https: None }
    }

    pub fn supports(&self, scheme: &str) -> bool {
        match scheme {
            "http" => true,
            "https" => self.https.is_some(),
            _ => false,
        }
    }

    pub fn tls(&self) -> Option<&TlsSettings> {
        self.https.as_ref()
    }
}
