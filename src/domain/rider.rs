//! Rider account and loyalty voucher entities

use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;

/// Rider account status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    /// Account can start rides
    Active,
    /// Account blocked by an operator
    Suspended,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Suspended => "Suspended",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(Self::Active),
            "Suspended" => Some(Self::Suspended),
            _ => None,
        }
    }
}

/// Registered rider
#[derive(Debug, Clone)]
pub struct Rider {
    /// Unique rider ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Contact e-mail
    pub email: String,
    /// Current monetary balance; may go negative after a ride debit
    pub balance: Decimal,
    /// Loyalty point balance, never negative
    pub eco_points: i32,
    /// Account status
    pub status: AccountStatus,
    /// When the account was created
    pub registered_at: DateTime<Utc>,
}

impl Rider {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        balance: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            balance,
            eco_points: 0,
            status: AccountStatus::Active,
            registered_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Subtract a ride cost. No floor: the balance is allowed to go
    /// negative, the minimum-balance gate applies at ride start only.
    pub fn debit(&mut self, amount: Decimal) {
        self.balance -= amount;
    }

    pub fn credit(&mut self, amount: Decimal) {
        self.balance += amount;
    }

    pub fn add_points(&mut self, points: i32) {
        self.eco_points += points;
    }
}

/// Voucher status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoucherStatus {
    Valid,
    Redeemed,
    Expired,
}

impl VoucherStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "Valid",
            Self::Redeemed => "Redeemed",
            Self::Expired => "Expired",
        }
    }
}

/// Monetary credit issued by converting loyalty points
#[derive(Debug, Clone)]
pub struct Voucher {
    /// Unique voucher ID
    pub id: String,
    /// Owning rider
    pub rider_id: String,
    /// Monetary value
    pub value: Decimal,
    /// When the voucher was issued
    pub issued_at: DateTime<Utc>,
    /// Issue time plus six months
    pub expires_at: DateTime<Utc>,
    /// Voucher status
    pub status: VoucherStatus,
}

impl Voucher {
    pub fn new(id: impl Into<String>, rider_id: impl Into<String>, value: Decimal) -> Self {
        let issued_at = Utc::now();
        let expires_at = issued_at
            .checked_add_months(Months::new(6))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            id: id.into(),
            rider_id: rider_id.into(),
            value,
            issued_at,
            expires_at,
            status: VoucherStatus::Valid,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// ── Tests ──────────────────────────────────────────────────────
