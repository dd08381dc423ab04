use serde::{Deserialize, Serialize};

/// A per-customer, per-product access code. At most one row exists per
/// (customer_email, product_id) pair, enforced by a unique index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    pub id: String,
    pub license_key: String,
    pub product_id: String,
    pub product_name: String,
    pub customer_email: String,
    pub duration: String,
    pub status: LicenseStatus,
    /// None = perpetual (lifetime)
    pub expires_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLicense {
    pub customer_email: String,
    pub product_id: String,
    pub product_name: String,
    pub duration: String,
    pub status: LicenseStatus,
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    /// Generated but not yet tied to a completed purchase (admin-issued keys)
    Unused,
    Active,
    Expired,
    Revoked,
}

impl LicenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unused => "unused",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unused" => Some(Self::Unused),
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }
}

impl std::str::FromStr for LicenseStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LicenseStatus::from_str(s).ok_or(())
    }
}

impl std::fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
