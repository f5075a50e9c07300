use proposta_db::models::user::User;

/// Decides whether an existing account is allowed to authenticate.
///
/// Consulted at login and by the auth gate on every protected request. The
/// `users` table carries no status column, so the default implementation
/// lets everyone through; a soft-delete feature plugs in here.
pub trait AccountStatus: Send + Sync {
    fn is_inactive(&self, user: &User) -> bool;
}

/// Every account is active.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllAccountsActive;

impl AccountStatus for AllAccountsActive {
    fn is_inactive(&self, _user: &User) -> bool {
        false
    }
}
