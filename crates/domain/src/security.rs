use std::collections::BTreeSet;
use std::str::FromStr;

use fincontrol_core::AppError;
use serde::{Deserialize, Serialize};

use crate::AuditedEntity;

/// Permissions enforced by application policy checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Allows reading expenses and their items, installments and payments.
    ExpenseRead,
    /// Allows mutating expenses and their children.
    ExpenseWrite,
    /// Allows reading vendors and contacts.
    VendorRead,
    /// Allows mutating vendors and contacts.
    VendorWrite,
    /// Allows reading financial accounts.
    AccountRead,
    /// Allows mutating financial accounts.
    AccountWrite,
    /// Allows managing back-office users.
    UserManage,
    /// Allows managing roles and grants.
    RoleManage,
    /// Allows reading audit records.
    AuditRead,
}

impl Permission {
    /// Returns a stable storage value for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExpenseRead => "expense.read",
            Self::ExpenseWrite => "expense.write",
            Self::VendorRead => "vendor.read",
            Self::VendorWrite => "vendor.write",
            Self::AccountRead => "account.read",
            Self::AccountWrite => "account.write",
            Self::UserManage => "user.manage",
            Self::RoleManage => "role.manage",
            Self::AuditRead => "audit.read",
        }
    }

    /// Returns all known permissions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Permission] = &[
            Permission::ExpenseRead,
            Permission::ExpenseWrite,
            Permission::VendorRead,
            Permission::VendorWrite,
            Permission::AccountRead,
            Permission::AccountWrite,
            Permission::UserManage,
            Permission::RoleManage,
            Permission::AuditRead,
        ];

        ALL
    }

    /// Returns the permission required to read rows of an entity.
    #[must_use]
    pub fn read_for(entity: AuditedEntity) -> Self {
        match entity {
            AuditedEntity::User => Self::UserManage,
            AuditedEntity::Vendor => Self::VendorRead,
            AuditedEntity::Account => Self::AccountRead,
            AuditedEntity::Expense
            | AuditedEntity::ExpenseItem
            | AuditedEntity::ExpenseInstallment
            | AuditedEntity::ExpensePayment
            | AuditedEntity::ExpenseCategory => Self::ExpenseRead,
        }
    }

    /// Returns the permission required to mutate rows of an entity.
    #[must_use]
    pub fn write_for(entity: AuditedEntity) -> Self {
        match entity {
            AuditedEntity::User => Self::UserManage,
            AuditedEntity::Vendor => Self::VendorWrite,
            AuditedEntity::Account => Self::AccountWrite,
            AuditedEntity::Expense
            | AuditedEntity::ExpenseItem
            | AuditedEntity::ExpenseInstallment
            | AuditedEntity::ExpensePayment
            | AuditedEntity::ExpenseCategory => Self::ExpenseWrite,
        }
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|permission| permission.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown permission value '{value}'")))
    }
}

/// Raw grant sources for one subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionGrants {
    /// Permissions inherited from assigned roles.
    pub role_grants: Vec<Permission>,
    /// Permissions granted directly to the subject.
    pub user_grants: Vec<Permission>,
    /// Permissions explicitly denied to the subject.
    pub user_denies: Vec<Permission>,
}

impl PermissionGrants {
    /// Effective permissions: role grants ∪ user grants − user denies.
    #[must_use]
    pub fn effective(&self) -> BTreeSet<Permission> {
        let denied: BTreeSet<Permission> = self.user_denies.iter().copied().collect();

        self.role_grants
            .iter()
            .chain(self.user_grants.iter())
            .copied()
            .filter(|permission| !denied.contains(permission))
            .collect()
    }

    /// Returns whether the subject effectively holds `permission`.
    #[must_use]
    pub fn allows(&self, permission: Permission) -> bool {
        self.effective().contains(&permission)
    }
}
