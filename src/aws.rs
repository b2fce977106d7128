//! AWS credential resolution and service-client construction.
//!
//! Credentials resolve through three tiers: the fixed environment
//! identifiers win over everything, then the deployment override block,
//! then the stored settings record (the latter two already merged by the
//! settings store). An IAM-role mode skips explicit keys entirely and
//! lets the client pick up instance credentials.
//!
//! The crate never builds the protocol client itself; hosts supply a
//! factory that consumes the resolved [`ClientArgs`]. The constructed
//! handle is cached for the process lifetime.

use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;

use crate::settings::SettingsStore;
use crate::storage::SettingsBackend;
use crate::{Error, Result};

/// Settings key for the AWS access key ID.
pub const SETTING_ACCESS_KEY_ID: &str = "access_key_id";

/// Settings key for the AWS secret access key.
pub const SETTING_SECRET_ACCESS_KEY: &str = "secret_access_key";

/// Settings key for the AWS region.
pub const SETTING_REGION: &str = "region";

/// Environment identifier for the access key ID.
pub const ACCESS_KEY_ID_ENV: &str = "AWS_ACCESS_KEY_ID";

/// Environment identifier for the secret access key.
pub const SECRET_ACCESS_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";

/// Environment identifier for the region.
pub const REGION_ENV: &str = "AWS_REGION";

/// Fallback environment identifier for the region.
pub const DEFAULT_REGION_ENV: &str = "AWS_DEFAULT_REGION";

/// Environment flag enabling instance-role credentials.
pub const USE_IAM_ROLE_ENV: &str = "AWS_USE_IAM_ROLE";

/// AWS regions selectable in host UIs: (code, display name).
pub const AWS_REGIONS: &[(&str, &str)] = &[
    ("us-east-1", "US Standard"),
    ("us-west-1", "Northern California"),
    ("us-west-2", "Oregon"),
    ("ca-central-1", "Montreal"),
    ("eu-west-1", "Ireland"),
    ("eu-west-2", "London"),
    ("eu-central-1", "Frankfurt"),
    ("ap-southeast-1", "Singapore"),
    ("ap-southeast-2", "Sydney"),
    ("ap-northeast-1", "Tokyo"),
    ("ap-northeast-2", "Seoul"),
    ("ap-south-1", "Mumbai"),
    ("sa-east-1", "Sao Paulo"),
];

/// Credential values read from the process environment.
///
/// Always passed in explicitly so tests can inject arbitrary values
/// without mutating the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvCredentials {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: Option<String>,

    /// Use instance-role credentials instead of explicit keys
    pub use_iam_role: bool,
}

impl EnvCredentials {
    /// No environment credentials defined.
    pub fn none() -> Self {
        Self::default()
    }

    /// Read the fixed credential identifiers from the process environment.
    ///
    /// Empty values count as unset. The region falls back from
    /// `AWS_REGION` to `AWS_DEFAULT_REGION`.
    pub fn from_process_env() -> Self {
        Self {
            access_key_id: non_empty_var(ACCESS_KEY_ID_ENV),
            secret_access_key: non_empty_var(SECRET_ACCESS_KEY_ENV),
            region: non_empty_var(REGION_ENV).or_else(|| non_empty_var(DEFAULT_REGION_ENV)),
            use_iam_role: non_empty_var(USE_IAM_ROLE_ENV).is_some_and(|value| is_truthy(&value)),
        }
    }

    /// Whether environment-credential mode is in effect.
    ///
    /// True when either key field is present. The settings fallback is
    /// then skipped for both fields: a half-configured environment yields
    /// an empty value for the missing half, not a stored one.
    pub fn has_key_overrides(&self) -> bool {
        self.access_key_id.is_some() || self.secret_access_key.is_some()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Arguments handed to the client factory.
///
/// Hosts can extend these through [`AwsService::on_client_args`] hooks,
/// e.g. to point the client at an alternate endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientArgs {
    /// Explicit credentials; `None` in IAM-role mode
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: Option<String>,

    /// Extra parameters injected by pre-construction hooks
    pub extra: BTreeMap<String, String>,
}

type ClientFactory<C> = Box<dyn Fn(&ClientArgs) -> Result<C>>;
type ClientArgsHook = Box<dyn Fn(&mut ClientArgs)>;

/// AWS service facade for one plugin: settings, credentials, and a
/// lazily-built, cached client handle.
pub struct AwsService<B: SettingsBackend, C> {
    settings: SettingsStore<B>,
    env: EnvCredentials,
    factory: ClientFactory<C>,
    args_hooks: Vec<ClientArgsHook>,
    client: Option<Rc<C>>,
}

impl<B: SettingsBackend, C> AwsService<B, C> {
    pub fn new(
        settings: SettingsStore<B>,
        env: EnvCredentials,
        factory: impl Fn(&ClientArgs) -> Result<C> + 'static,
    ) -> Self {
        Self {
            settings,
            env,
            factory: Box::new(factory),
            args_hooks: Vec::new(),
            client: None,
        }
    }

    pub fn settings(&self) -> &SettingsStore<B> {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SettingsStore<B> {
        &mut self.settings
    }

    /// Register a hook that can adjust the factory arguments before the
    /// client is built. Hooks run in registration order.
    pub fn on_client_args(&mut self, hook: impl Fn(&mut ClientArgs) + 'static) {
        self.args_hooks.push(Box::new(hook));
    }

    /// The access key ID: environment identifier, else effective setting,
    /// else empty.
    pub fn access_key_id(&mut self) -> Result<String> {
        if self.env.has_key_overrides() {
            return Ok(self.env.access_key_id.clone().unwrap_or_default());
        }
        self.settings.setting(SETTING_ACCESS_KEY_ID, "")
    }

    /// The secret access key: environment identifier, else effective
    /// setting, else empty.
    pub fn secret_access_key(&mut self) -> Result<String> {
        if self.env.has_key_overrides() {
            return Ok(self.env.secret_access_key.clone().unwrap_or_default());
        }
        self.settings.setting(SETTING_SECRET_ACCESS_KEY, "")
    }

    /// The region, when configured anywhere.
    pub fn region(&mut self) -> Result<Option<String>> {
        if let Some(region) = &self.env.region {
            return Ok(Some(region.clone()));
        }

        let region = self.settings.setting(SETTING_REGION, "")?;
        Ok((!region.is_empty()).then_some(region))
    }

    /// Whether both key fields resolve to non-empty values.
    pub fn are_access_keys_set(&mut self) -> Result<bool> {
        Ok(!self.access_key_id()?.is_empty() && !self.secret_access_key()?.is_empty())
    }

    /// Whether explicit access keys still need to be configured.
    ///
    /// Never true in IAM-role mode. A half-configured key pair still
    /// needs keys.
    pub fn needs_access_keys(&mut self) -> Result<bool> {
        if self.use_iam_roles() {
            return Ok(false);
        }
        Ok(!self.are_access_keys_set()?)
    }

    /// Whether instance-role credentials are enabled.
    pub fn use_iam_roles(&self) -> bool {
        self.env.use_iam_role
    }

    /// The service client, built on first use and cached for the process
    /// lifetime.
    ///
    /// Fails with [`Error::CredentialsMissing`] while keys are needed but
    /// not configured; callers should surface configuration guidance, not
    /// abort.
    pub fn client(&mut self) -> Result<Rc<C>> {
        if self.needs_access_keys()? {
            return Err(Error::CredentialsMissing);
        }

        if let Some(client) = &self.client {
            return Ok(Rc::clone(client));
        }

        let mut args = ClientArgs::default();
        if !self.use_iam_roles() {
            args.access_key_id = Some(self.access_key_id()?);
            args.secret_access_key = Some(self.secret_access_key()?);
        }
        args.region = self.region()?;
        for hook in &self.args_hooks {
            hook(&mut args);
        }

        debug!(slug = %self.settings.descriptor().slug, "constructing AWS service client");
        let client = Rc::new((self.factory)(&args)?);
        self.client = Some(Rc::clone(&client));
        Ok(client)
    }
}

impl<B: SettingsBackend, C> std::fmt::Debug for AwsService<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsService")
            .field("settings", &self.settings)
            .field("cached_client", &self.client.is_some())
            .finish()
    }
}
