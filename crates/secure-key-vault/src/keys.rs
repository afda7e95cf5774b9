//! Storage key constants.

/// Vault account names used by FieldSync
pub struct StorageKeys;

impl StorageKeys {
    /// Hex-encoded secret that unlocks the local encrypted database
    pub const LOCAL_DATABASE_KEY: &'static str = "local_database_key";

    /// Bearer token issued by the auth flow
    pub const ACCESS_TOKEN: &'static str = "access_token";
}
