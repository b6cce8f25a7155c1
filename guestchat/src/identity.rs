//! Anonymous device identity.
//!
//! A guest has no account. Instead each device generates an opaque ID once,
//! persists it, and presents it on every request. A display name derived
//! from the ID is persisted alongside and can be changed via a server-side
//! rename.

use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::{Rng, TryRngCore};

use guestchat_proto::api::RenameRequest;
use guestchat_proto::message::{ValidationError, validate_display_name};

use crate::api::{ApiError, ChatApi};
use crate::storage::{ClientStorage, DEVICE_ID_KEY, DEVICE_NAME_KEY, StorageError};

/// Minimum length of a persisted device ID to be trusted.
pub const MIN_DEVICE_ID_LEN: usize = 8;

/// Persisted names shorter than this are replaced with a default.
pub const MIN_PERSISTED_NAME_LEN: usize = 4;

/// Prefix of generated default display names.
pub const DEFAULT_NAME_PREFIX: &str = "Guest-";

/// Errors that can occur when renaming the device.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The requested name is too short or too long.
    #[error(transparent)]
    InvalidName(#[from] ValidationError),

    /// The backend rejected or failed the rename.
    #[error("rename failed: {0}")]
    Api(#[from] ApiError),

    /// The server accepted the rename but it could not be saved locally.
    #[error("rename saved on server but not locally: {0}")]
    Storage(#[from] StorageError),
}

/// The anonymous identity of this device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    id: String,
    name: String,
}

impl DeviceIdentity {
    /// Load the persisted identity, creating and persisting whatever is
    /// missing or invalid. Never fails.
    pub fn load_or_create<S: ClientStorage + ?Sized>(storage: &S) -> Self {
        let id = get_or_create_device_id(storage);
        let name = get_or_create_device_name(storage, &id);
        Self { id, name }
    }

    /// Build an identity from known parts.
    #[must_use]
    pub const fn new(id: String, name: String) -> Self {
        Self { id, name }
    }

    /// The stable device identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The current display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Whether `id` looks like something this crate generated:
/// lowercase ASCII alphanumerics and hyphens, at least
/// [`MIN_DEVICE_ID_LEN`] long.
#[must_use]
pub fn is_valid_device_id(id: &str) -> bool {
    id.len() >= MIN_DEVICE_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Return the persisted device ID, generating and persisting a new one if
/// it is absent or fails [`is_valid_device_id`].
///
/// Never fails: if the new ID cannot be persisted the failure is logged and
/// the ID is still returned for this session.
pub fn get_or_create_device_id<S: ClientStorage + ?Sized>(storage: &S) -> String {
    if let Some(existing) = storage.get(DEVICE_ID_KEY) {
        if is_valid_device_id(&existing) {
            return existing;
        }
        tracing::warn!(device_id = %existing, "discarding malformed persisted device id");
    }

    let id = generate_device_id();
    if let Err(e) = storage.set(DEVICE_ID_KEY, &id) {
        tracing::warn!(device_id = %id, error = %e, "failed to persist device id");
    } else {
        tracing::info!(device_id = %id, "generated new device id");
    }
    id
}

/// Return the persisted display name, deriving and persisting
/// `Guest-<suffix>` if it is absent or too short.
pub fn get_or_create_device_name<S: ClientStorage + ?Sized>(storage: &S, id: &str) -> String {
    if let Some(existing) = storage.get(DEVICE_NAME_KEY)
        && existing.chars().count() >= MIN_PERSISTED_NAME_LEN
    {
        return existing;
    }

    let name = default_device_name(id);
    if let Err(e) = storage.set(DEVICE_NAME_KEY, &name) {
        tracing::warn!(name = %name, error = %e, "failed to persist device name");
    }
    name
}

/// `Guest-` followed by the last four alphanumerics of `id`, or by four
/// random characters when the ID has fewer than four.
#[must_use]
pub fn default_device_name(id: &str) -> String {
    let alnum: Vec<char> = id.chars().filter(char::is_ascii_alphanumeric).collect();
    let suffix: String = if alnum.len() >= 4 {
        alnum[alnum.len() - 4..].iter().collect()
    } else {
        random_lowercase(4)
    };
    format!("{DEFAULT_NAME_PREFIX}{suffix}")
}

/// Rename the device on the server, then persist the new name locally.
///
/// Returns the trimmed name that was stored. On any failure the persisted
/// name is left untouched.
///
/// # Errors
///
/// - [`IdentityError::InvalidName`] if the name is not 3–50 characters.
/// - [`IdentityError::Api`] if the backend call fails.
/// - [`IdentityError::Storage`] if the server accepted the rename but the
///   local write failed.
pub async fn rename_device<A, S>(
    api: &A,
    storage: &S,
    device_id: &str,
    new_name: &str,
) -> Result<String, IdentityError>
where
    A: ChatApi,
    S: ClientStorage + ?Sized,
{
    let name = validate_display_name(new_name)?.to_string();
    let request = RenameRequest {
        device_id: device_id.to_string(),
        new_name: name.clone(),
    };

    api.rename_device(device_id, &request).await.map_err(|e| {
        tracing::warn!(device_id, error = %e, "device rename rejected");
        e
    })?;

    storage.set(DEVICE_NAME_KEY, &name)?;
    tracing::info!(device_id, name = %name, "device renamed");
    Ok(name)
}

/// Generate a fresh device ID.
///
/// Prefers a random UUID from the OS entropy source and falls back to
/// `<base36 millis>-<random>` if that source is unavailable.
fn generate_device_id() -> String {
    let mut bytes = [0u8; 16];
    match rand::rngs::OsRng.try_fill_bytes(&mut bytes) {
        Ok(()) => uuid::Builder::from_random_bytes(bytes)
            .into_uuid()
            .to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "OS randomness unavailable, using fallback device id");
            fallback_device_id()
        }
    }
}

fn fallback_device_id() -> String {
    let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    format!("{}-{}", to_base36(millis), random_lowercase(9))
}

fn random_lowercase(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
