//! 权限模型
//!
//! 请求主体 (`Principal`) 由认证中间件从 JWT 中解析并挂到请求扩展上。
//! 各接口的访问规则通过 `AccessContext` 上的谓词按顺序组合判断，
//! 任一谓词失败即返回 `AuthError`（未登录）或 `PermissionDenied`。

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// 修改工单状态，同时可以查看所有未审核工单
    UpdateStatus,
    EditAllTickets,
    EditAllComments,
    ManageLabels,
    ViewAllStats,
    ViewTransactionStats,
    /// 不允许持有钱包（如员工账号）
    NoWallet,
}

impl Permission {
    pub const ALL: [Permission; 7] = [
        Permission::UpdateStatus,
        Permission::EditAllTickets,
        Permission::EditAllComments,
        Permission::ManageLabels,
        Permission::ViewAllStats,
        Permission::ViewTransactionStats,
        Permission::NoWallet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::UpdateStatus => "update_status",
            Permission::EditAllTickets => "edit_all_tickets",
            Permission::EditAllComments => "edit_all_comments",
            Permission::ManageLabels => "manage_labels",
            Permission::ViewAllStats => "view_all_stats",
            Permission::ViewTransactionStats => "view_transaction_stats",
            Permission::NoWallet => "no_wallet",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| AppError::ValidationError(format!("Unknown permission: {s}")))
    }
}

/// 已认证的请求主体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i32,
    pub permissions: HashSet<Permission>,
}

impl Principal {
    pub fn new(user_id: i32, permissions: HashSet<Permission>) -> Self {
        Self {
            user_id,
            permissions,
        }
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn can_hold_wallet(&self) -> bool {
        !self.has(Permission::NoWallet)
    }
}

/// 一次访问判断所需的上下文：当前主体 + 被访问对象的所有者
#[derive(Debug, Clone, Copy)]
pub struct AccessContext<'a> {
    principal: Option<&'a Principal>,
    owner_id: Option<i32>,
}

impl<'a> AccessContext<'a> {
    pub fn new(principal: Option<&'a Principal>) -> Self {
        Self {
            principal,
            owner_id: None,
        }
    }

    pub fn owned_by(mut self, owner_id: i32) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn require_login(&self) -> AppResult<&'a Principal> {
        self.principal
            .ok_or_else(|| AppError::AuthError("Login required".to_string()))
    }

    pub fn require_permission(&self, permission: Permission) -> AppResult<&'a Principal> {
        let principal = self.require_login()?;
        if principal.has(permission) {
            Ok(principal)
        } else {
            Err(AppError::PermissionDenied)
        }
    }

    /// 对象作者本人，或持有指定权限
    pub fn require_author_or(&self, permission: Permission) -> AppResult<&'a Principal> {
        let principal = self.require_login()?;
        if self.owner_id == Some(principal.user_id) || principal.has(permission) {
            Ok(principal)
        } else {
            Err(AppError::PermissionDenied)
        }
    }

    /// 仅对象作者本人
    pub fn require_owner(&self) -> AppResult<&'a Principal> {
        let principal = self.require_login()?;
        if self.owner_id == Some(principal.user_id) {
            Ok(principal)
        } else {
            Err(AppError::PermissionDenied)
        }
    }

    pub fn require_wallet_holder(&self) -> AppResult<&'a Principal> {
        let principal = self.require_login()?;
        if principal.can_hold_wallet() {
            Ok(principal)
        } else {
            Err(AppError::PermissionDenied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(user_id: i32, perms: &[Permission]) -> Principal {
        Principal::new(user_id, perms.iter().copied().collect())
    }

    #[test]
    fn test_permission_names_round_trip() {
        for p in Permission::ALL {
            assert_eq!(p.to_string().parse::<Permission>().unwrap(), p);
        }
        assert!("can_fly".parse::<Permission>().is_err());
    }

    #[test]
    fn test_anonymous_needs_login() {
        let ctx = AccessContext::new(None);
        assert!(matches!(ctx.require_login(), Err(AppError::AuthError(_))));
        assert!(matches!(
            ctx.require_permission(Permission::UpdateStatus),
            Err(AppError::AuthError(_))
        ));
    }

    #[test]
    fn test_author_or_permission() {
        let author = principal(1, &[]);
        let stranger = principal(2, &[]);
        let editor = principal(3, &[Permission::EditAllTickets]);

        assert!(
            AccessContext::new(Some(&author))
                .owned_by(1)
                .require_author_or(Permission::EditAllTickets)
                .is_ok()
        );
        assert!(matches!(
            AccessContext::new(Some(&stranger))
                .owned_by(1)
                .require_author_or(Permission::EditAllTickets),
            Err(AppError::PermissionDenied)
        ));
        assert!(
            AccessContext::new(Some(&editor))
                .owned_by(1)
                .require_author_or(Permission::EditAllTickets)
                .is_ok()
        );
        assert!(
            AccessContext::new(Some(&editor))
                .owned_by(1)
                .require_owner()
                .is_err()
        );
    }

    #[test]
    fn test_wallet_holder() {
        let staff = principal(1, &[Permission::NoWallet]);
        let user = principal(2, &[]);
        assert!(AccessContext::new(Some(&staff)).require_wallet_holder().is_err());
        assert!(AccessContext::new(Some(&user)).require_wallet_holder().is_ok());
    }
}
